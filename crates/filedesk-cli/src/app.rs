//! Composition root: builds the single credential store and hands it to
//! the request pipeline and session actions.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use filedesk_core::auth::{decode_claims, FileStorage, KeyringStorage, MemoryStorage, TokenStorage};
use filedesk_core::models::{PageParams, RegisterRequest};
use filedesk_core::utils::{format_date, format_file_size, initials, truncate_string};
use filedesk_core::{ApiClient, Config, CredentialStore, Session, StorageBackend};
use tracing::warn;

/// Widest name shown in listings
const NAME_COLUMN_WIDTH: usize = 40;

pub struct App {
    pub config: Config,
    pub session: Session,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let storage: Arc<dyn TokenStorage> = match config.storage {
            StorageBackend::File => Arc::new(FileStorage::new(config.storage_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };

        let store = CredentialStore::new(storage);
        let api = ApiClient::new(&config, store).context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            session: Session::new(api),
        })
    }

    fn api(&self) -> &ApiClient {
        self.session.api()
    }

    fn prompt(label: &str) -> Result<String> {
        print!("{}: ", label);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn prompt_password() -> Result<String> {
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }

    fn require_session(&self) -> Result<()> {
        let store = self.session.store();
        if store.is_authenticated() || store.refresh_token().is_some() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Not signed in. Run `filedesk login` first."))
        }
    }

    pub async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username {
            Some(name) => name,
            None => match self.config.last_username.clone() {
                Some(last) => {
                    let input = Self::prompt(&format!("Username [{}]", last))?;
                    if input.is_empty() {
                        last
                    } else {
                        input
                    }
                }
                None => Self::prompt("Username")?,
            },
        };
        if username.is_empty() {
            return Err(anyhow::anyhow!("Username required"));
        }
        let password = Self::prompt_password()?;

        println!("Signing in...");
        let user = self.session.sign_in(&username, &password).await?;

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Signed in as {} ({})", user.display_name(), user.role);
        Ok(())
    }

    pub async fn register(&self) -> Result<()> {
        let username = Self::prompt("Username")?;
        let email = Self::prompt("Email")?;
        let full_name = Self::prompt("Full name")?;
        let password = Self::prompt_password()?;

        let request = RegisterRequest {
            username,
            email,
            password,
            full_name,
        };
        self.session.sign_up(&request).await?;
        println!("Account created. Run `filedesk login` to sign in.");
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        match self.session.sign_out().await {
            Ok(()) => println!("Signed out."),
            // The local session is gone either way
            Err(e) => println!("Signed out locally ({}).", e),
        }
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        let store = self.session.store();
        let claims = store
            .access_token()
            .and_then(|t| decode_claims(&t));

        match (store.is_authenticated(), claims) {
            (true, Some(claims)) => {
                let remaining = claims.time_until_expiry(Utc::now());
                println!(
                    "Signed in; access token valid for {}m",
                    remaining.num_minutes().max(0)
                );
            }
            _ if store.refresh_token().is_some() => {
                println!("Access token expired; it will be refreshed on the next request");
            }
            _ => println!("Not signed in"),
        }
        Ok(())
    }

    pub async fn profile(&self) -> Result<()> {
        self.require_session()?;
        let user = self.session.fetch_profile().await?;

        println!("[{}] {}", initials(&user.full_name), user.display_name());
        println!("  Username: {}", user.username);
        println!("  Email:    {}", user.email);
        println!("  Role:     {}", user.role);
        println!("  Joined:   {}", format_date(&user.created_at));
        Ok(())
    }

    pub async fn files(&self, folder: Option<&str>) -> Result<()> {
        self.require_session()?;
        let entries = match folder {
            Some(id) => self.api().folder_content(id).await?,
            None => self.api().list_files(&PageParams::default()).await?.content,
        };

        if entries.is_empty() {
            println!("No files");
        }
        for entry in entries {
            let size = if entry.is_folder {
                "-".to_string()
            } else {
                format_file_size(entry.size)
            };
            println!(
                "{:<12} {:<width$} {:>10}  {}",
                entry.icon(),
                truncate_string(&entry.name, NAME_COLUMN_WIDTH),
                size,
                format_date(&entry.updated_at),
                width = NAME_COLUMN_WIDTH,
            );
        }
        Ok(())
    }

    pub async fn users(&self) -> Result<()> {
        self.require_session()?;
        let page = self.api().list_users(&PageParams::default()).await?;

        for user in &page.content {
            println!(
                "{:<4} {:<20} {:<30} {}",
                initials(&user.full_name),
                truncate_string(&user.username, 20),
                truncate_string(&user.email, 30),
                user.role
            );
        }
        println!("{} of {} users", page.content.len(), page.total_elements);
        Ok(())
    }

    pub async fn notifications(&self) -> Result<()> {
        self.require_session()?;
        let unread = self.api().unread_notifications().await?;

        if unread.is_empty() {
            println!("No unread notifications");
        }
        for notification in unread {
            println!(
                "{:?} {} - {} ({})",
                notification.kind,
                notification.title,
                notification.message,
                format_date(&notification.created_at)
            );
        }
        Ok(())
    }
}
