//! Typed calls for files, folders, users and notifications.
//!
//! These are thin wrappers over the pipeline; authentication and refresh are
//! handled there, so nothing here looks at tokens.

use super::client::{ApiClient, ApiRequest};
use super::endpoints::{files, folders, notifications, users};
use super::ApiResult;
use crate::models::{
    CreateFolderRequest, CreateUserRequest, FileItem, FilePermission, Notification, Page,
    PageParams, UpdateUserRequest, User,
};

impl ApiClient {
    // ===== Users =====

    pub async fn list_users(&self, page: &PageParams) -> ApiResult<Page<User>> {
        self.send(ApiRequest::get(users::ALL).query(page.to_query()))
            .await
    }

    pub async fn get_user(&self, id: &str) -> ApiResult<User> {
        self.get(&users::by_id(id)).await
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> ApiResult<User> {
        self.post(users::ALL, request).await
    }

    pub async fn update_user(&self, id: &str, request: &UpdateUserRequest) -> ApiResult<User> {
        self.put(&users::by_id(id), request).await
    }

    pub async fn delete_user(&self, id: &str) -> ApiResult<()> {
        self.delete(&users::by_id(id)).await
    }

    // ===== Files =====

    pub async fn list_files(&self, page: &PageParams) -> ApiResult<Page<FileItem>> {
        self.send(ApiRequest::get(files::ALL).query(page.to_query()))
            .await
    }

    pub async fn get_file(&self, id: &str) -> ApiResult<FileItem> {
        self.get(&files::by_id(id)).await
    }

    pub async fn file_info(&self, id: &str) -> ApiResult<FileItem> {
        self.get(&files::info(id)).await
    }

    pub async fn search_files(&self, query: &str) -> ApiResult<Vec<FileItem>> {
        self.send(ApiRequest::get(files::SEARCH).query([("q", query)]))
            .await
    }

    pub async fn download_file(&self, id: &str) -> ApiResult<Vec<u8>> {
        self.send_bytes(ApiRequest::get(files::download(id))).await
    }

    pub async fn delete_file(&self, id: &str) -> ApiResult<()> {
        self.delete(&files::by_id(id)).await
    }

    pub async fn file_permissions(&self, file_id: &str) -> ApiResult<Vec<FilePermission>> {
        self.get(&files::permissions(file_id)).await
    }

    // ===== Folders =====

    pub async fn list_folders(&self) -> ApiResult<Vec<FileItem>> {
        self.get(folders::ALL).await
    }

    pub async fn get_folder(&self, id: &str) -> ApiResult<FileItem> {
        self.get(&folders::by_id(id)).await
    }

    pub async fn create_folder(&self, request: &CreateFolderRequest) -> ApiResult<FileItem> {
        self.post(folders::ALL, request).await
    }

    pub async fn delete_folder(&self, id: &str) -> ApiResult<()> {
        self.delete(&folders::by_id(id)).await
    }

    /// Entries directly inside a folder.
    pub async fn folder_content(&self, id: &str) -> ApiResult<Vec<FileItem>> {
        self.get(&folders::content(id)).await
    }

    // ===== Notifications =====

    pub async fn list_notifications(&self) -> ApiResult<Vec<Notification>> {
        self.get(notifications::ALL).await
    }

    pub async fn unread_notifications(&self) -> ApiResult<Vec<Notification>> {
        self.get(notifications::UNREAD).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> ApiResult<()> {
        self.send_empty(ApiRequest::put(notifications::mark_as_read(id)))
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> ApiResult<()> {
        self.send_empty(ApiRequest::put(notifications::MARK_ALL_AS_READ))
            .await
    }

    pub async fn delete_notification(&self, id: &str) -> ApiResult<()> {
        self.delete(&notifications::by_id(id)).await
    }
}
