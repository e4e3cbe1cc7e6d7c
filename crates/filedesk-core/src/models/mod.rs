//! Wire models for the file-management API.
//!
//! - `User` and the auth request/response bodies
//! - `FileItem`, `FilePermission`: files, folders and sharing
//! - `Notification`: per-user notices
//! - `Page<T>`: the server's paginated envelope

pub mod file;
pub mod notification;
pub mod page;
pub mod user;

pub use file::{CreateFolderRequest, FileItem, FilePermission, PermissionType};
pub use notification::{Notification, NotificationType};
pub use page::{Page, PageParams};
pub use user::{
    ChangePasswordRequest, CreateUserRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, RegisterRequest, ResetPasswordRequest, UpdateProfileRequest,
    UpdateUserRequest, User,
};
