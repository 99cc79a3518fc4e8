//! These structs provide the CLI interface for the receipt CLI.

use crate::model::Category;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// receipt: Scan paper receipts and log them to a Google sheet.
///
/// A picture of a receipt is sent to Gemini, which returns the merchant, date, total, currency,
/// category and line items. You can correct any of these before the receipt is sent as one row to
/// a Google Apps Script Web App that appends it to your spreadsheet.
///
/// You need a Gemini API key in the environment (GEMINI_API_KEY by default) and a deployed Web
/// App. Run `receipt setup` for the script and the deployment steps.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and a default config.json.
    ///
    /// Decide what directory you want to store data in and pass this as --receipt-home. By
    /// default, it will be $HOME/receipts.
    Init,
    /// Save or show the webhook and spreadsheet URLs.
    Settings(SettingsArgs),
    /// Send a test row to the webhook.
    TestConnection,
    /// Extract a receipt from an image and print it as JSON. Nothing is exported.
    Analyze(AnalyzeArgs),
    /// Extract a receipt from an image, apply corrections and export it to the webhook.
    Scan(ScanArgs),
    /// Print the Apps Script receiver code and how to deploy it.
    Setup,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration and settings are held. Defaults to ~/receipts
    #[arg(long, env = "RECEIPT_HOME", default_value_t = default_receipt_home())]
    receipt_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, receipt_home: PathBuf) -> Self {
        Self {
            log_level,
            receipt_home: receipt_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn receipt_home(&self) -> &DisplayPath {
        &self.receipt_home
    }
}

/// Args for the `receipt settings` command.
#[derive(Debug, Parser, Clone)]
pub struct SettingsArgs {
    #[command(subcommand)]
    action: SettingsAction,
}

impl SettingsArgs {
    pub fn new(action: SettingsAction) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &SettingsAction {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsAction {
    /// Validate and store the URLs.
    Save(SaveSettingsArgs),
    /// Print the stored URLs.
    Show,
}

/// Args for the `receipt settings save` command.
#[derive(Debug, Parser, Clone)]
pub struct SaveSettingsArgs {
    /// The Web App URL from Deploy > Manage Deployments. It looks like this:
    /// https://script.google.com/macros/s/AKfycb.../exec
    #[arg(long, default_value = "")]
    webhook: String,

    /// The URL of your spreadsheet, for reference only.
    #[arg(long, default_value = "")]
    sheet: String,
}

impl SaveSettingsArgs {
    pub fn new(webhook: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            webhook: webhook.into(),
            sheet: sheet.into(),
        }
    }

    pub fn webhook(&self) -> &str {
        &self.webhook
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }
}

/// Args for the `receipt analyze` command.
#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// A JPEG picture of the receipt.
    #[arg(long)]
    image: PathBuf,
}

impl AnalyzeArgs {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
        }
    }

    pub fn image(&self) -> &Path {
        &self.image
    }
}

/// Args for the `receipt scan` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct ScanArgs {
    /// A JPEG picture of the receipt.
    #[arg(long)]
    image: PathBuf,

    /// Replace the merchant name.
    #[arg(long)]
    merchant: Option<String>,

    /// Replace the category. One of Dining, Groceries, Travel, Shopping, Utilities, Health,
    /// Entertainment, Services, Other.
    #[arg(long)]
    category: Option<Category>,

    /// Rename an item, e.g. `--item-name 0=Latte`. Items are numbered from 0. Can be repeated.
    #[arg(long = "item-name", value_parser = parse_item_edit)]
    item_names: Vec<ItemEdit>,

    /// Change the price of an item, e.g. `--item-price 1=3.25`. Can be repeated.
    #[arg(long = "item-price", value_parser = parse_item_edit)]
    item_prices: Vec<ItemEdit>,

    /// Stop after the review: print the corrected receipt and cancel instead of exporting.
    #[arg(long)]
    dry_run: bool,
}

impl ScanArgs {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_item_name(mut self, index: usize, name: impl Into<String>) -> Self {
        self.item_names.push(ItemEdit::new(index, name));
        self
    }

    pub fn with_item_price(mut self, index: usize, price: impl Into<String>) -> Self {
        self.item_prices.push(ItemEdit::new(index, price));
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn merchant(&self) -> Option<&str> {
        self.merchant.as_deref()
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn item_names(&self) -> &[ItemEdit] {
        &self.item_names
    }

    pub fn item_prices(&self) -> &[ItemEdit] {
        &self.item_prices
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// An `INDEX=VALUE` pair from the command line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ItemEdit {
    index: usize,
    value: String,
}

impl ItemEdit {
    pub fn new(index: usize, value: impl Into<String>) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

fn parse_item_edit(s: &str) -> Result<ItemEdit, String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=VALUE, got '{s}'"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("'{index}' is not an item index: {e}"))?;
    Ok(ItemEdit::new(index, value))
}

fn default_receipt_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("receipts"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --receipt-home or RECEIPT_HOME instead of relying on the default \
                receipts directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("receipts")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_args() {
        let args = Args::try_parse_from([
            "receipt",
            "--receipt-home",
            "/tmp/r",
            "scan",
            "--image",
            "r.jpg",
            "--category",
            "Groceries",
            "--item-name",
            "0=Latte",
            "--item-price",
            "1=3.25",
            "--item-price",
            "2=1",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.common().receipt_home().path(), Path::new("/tmp/r"));
        let Command::Scan(scan) = args.command() else {
            panic!("expected scan, got {:?}", args.command());
        };
        assert_eq!(scan.image(), Path::new("r.jpg"));
        assert_eq!(scan.category(), Some(Category::Groceries));
        assert_eq!(scan.item_names(), &[ItemEdit::new(0, "Latte")]);
        assert_eq!(scan.item_prices().len(), 2);
        assert!(scan.dry_run());
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let result = Args::try_parse_from([
            "receipt", "scan", "--image", "r.jpg", "--category", "Snacks",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_item_edit() {
        assert_eq!(parse_item_edit("3=a=b").unwrap(), ItemEdit::new(3, "a=b"));
        assert!(parse_item_edit("x=1").is_err());
        assert!(parse_item_edit("nope").is_err());
    }

    #[test]
    fn test_settings_save_args() {
        let args = Args::try_parse_from([
            "receipt",
            "settings",
            "save",
            "--webhook",
            "https://script.google.com/macros/s/x/exec",
        ])
        .unwrap();
        let Command::Settings(settings) = args.command() else {
            panic!("expected settings");
        };
        let SettingsAction::Save(save) = settings.action() else {
            panic!("expected save");
        };
        assert_eq!(save.sheet(), "");
        assert_eq!(args.common().log_level(), LevelFilter::INFO);
    }
}
