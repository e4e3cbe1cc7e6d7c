//! REST paths, relative to the configured API base URL.

pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const REFRESH_TOKEN: &str = "/auth/refresh-token";
    pub const LOGOUT: &str = "/auth/logout";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";

    /// Whether `path` addresses the refresh endpoint.
    pub fn is_refresh(path: &str) -> bool {
        path.trim_end_matches('/').ends_with(REFRESH_TOKEN)
    }
}

pub mod users {
    pub const PROFILE: &str = "/users/profile";
    pub const CHANGE_PASSWORD: &str = "/users/change-password";
    pub const ALL: &str = "/users";

    pub fn by_id(id: &str) -> String {
        format!("/users/{}", id)
    }
}

pub mod files {
    pub const ALL: &str = "/files";
    pub const SEARCH: &str = "/files/search";

    pub fn by_id(id: &str) -> String {
        format!("/files/{}", id)
    }

    pub fn info(id: &str) -> String {
        format!("/files/{}/info", id)
    }

    pub fn download(id: &str) -> String {
        format!("/files/{}/download", id)
    }

    pub fn permissions(file_id: &str) -> String {
        format!("/files/{}/permissions", file_id)
    }
}

pub mod folders {
    pub const ALL: &str = "/folders";

    pub fn by_id(id: &str) -> String {
        format!("/folders/{}", id)
    }

    pub fn content(id: &str) -> String {
        format!("/folders/{}/content", id)
    }
}

pub mod notifications {
    pub const ALL: &str = "/notifications";
    pub const UNREAD: &str = "/notifications/unread";
    pub const MARK_ALL_AS_READ: &str = "/notifications/read-all";

    pub fn mark_as_read(id: &str) -> String {
        format!("/notifications/{}/read", id)
    }

    pub fn by_id(id: &str) -> String {
        format!("/notifications/{}", id)
    }
}
