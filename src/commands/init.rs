use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory and an initial `config.json` file with default settings.
///
/// # Arguments
/// - `receipt_home` - The directory that will be the root of data directory, e.g. `$HOME/receipts`
///
/// # Errors
/// - Returns an error if a `config.json` already exists.
/// - Returns an error if any file operations fail.
pub async fn init(receipt_home: &Path) -> Result<Out<()>> {
    let config = Config::create(receipt_home).await?;
    Ok(format!(
        "Created '{}'. Next, run `receipt setup` to deploy the spreadsheet receiver",
        config.config_path().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("receipts");
        let out = init(&home).await.unwrap();
        assert!(out.message().contains("config.json"));
        assert!(home.join("config.json").is_file());

        let err = init(&home).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::Configuration);
    }
}
