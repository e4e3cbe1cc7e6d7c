//! Files, folders and sharing permissions.

use serde::{Deserialize, Serialize};

/// A file or folder entry. Folders have `is_folder` set and no MIME data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl FileItem {
    /// Icon key for the entry, derived from the MIME type.
    pub fn icon(&self) -> &'static str {
        if self.is_folder {
            return "folder";
        }
        match self.mime_type.as_deref() {
            Some(mime) => icon_for_mime_type(mime),
            None => "file",
        }
    }
}

fn icon_for_mime_type(mime: &str) -> &'static str {
    match mime {
        m if m.starts_with("image/") => "file-image",
        m if m.starts_with("video/") => "file-video",
        m if m.starts_with("audio/") => "file-audio",
        "application/pdf" => "file-pdf",
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "file-word",
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "file-excel",
        "application/vnd.ms-powerpoint"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "file-ppt",
        "application/zip" | "application/x-rar-compressed" | "application/x-7z-compressed" => {
            "file-zip"
        }
        "text/plain" => "file-text",
        "text/html" | "application/xhtml+xml" => "file-code",
        _ => "file",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionType {
    Read,
    Write,
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePermission {
    pub id: String,
    pub file_id: String,
    pub user_id: String,
    pub permission_type: PermissionType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}
