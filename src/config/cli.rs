use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "scan-chef")]
#[command(about = "Turn the ingredients you have into recipe suggestions")]
pub struct CliConfig {
    #[arg(long, global = true, help = "TOML config file; environment variables are used otherwise")]
    pub config: Option<String>,

    #[arg(long, global = true)]
    pub email: Option<String>,

    #[arg(long, global = true)]
    pub password: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate recipes from a list of ingredients
    Generate {
        #[arg(long, value_delimiter = ',', required = true)]
        ingredients: Vec<String>,

        #[arg(long, help = "Save every generated recipe to your account")]
        save: bool,
    },
    /// Show saved recipes, or the example set when none are available
    Recipes,
    /// Show stored ingredients
    Ingredients,
    /// Store ingredients for the signed-in user
    AddIngredients {
        #[arg(value_delimiter = ',', required = true)]
        names: Vec<String>,
    },
    /// Create an account with --email and --password
    SignUp,
    /// Show the signed-in user
    Whoami {
        #[arg(long, help = "Exchange the refresh token for a new session first")]
        refresh: bool,
    },
}

impl Command {
    /// Whether connecting should sign in with the supplied credentials.
    pub fn signs_in(&self) -> bool {
        !matches!(self, Command::SignUp)
    }
}
