use clap::Parser;
use scan_chef::config::cli::Command;
use scan_chef::core::{AuthProvider, Notice, RecipeDraft};
use scan_chef::domain::model::NoticeLevel;
use scan_chef::utils::error::{ChefError, ErrorSeverity};
use scan_chef::utils::logger;
use scan_chef::utils::validation::{validate_required_field, Validate};
use scan_chef::{CliConfig, RecipeOrchestrator, ServiceSettings, SupabaseClient, TomlConfig};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting scan-chef CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config.command);
    }

    let settings = match load_settings(&config) {
        Ok(settings) => settings,
        Err(e) => fail(e),
    };

    // 驗證配置
    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        fail(e);
    }

    let orchestrator = match connect(&config, &settings).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => fail(e),
    };
    let mut notices = orchestrator.notices();
    let _session = orchestrator.observe_session();

    let outcome = run(&orchestrator, &config).await;
    drain_notices(&mut notices);

    if let Err(e) = outcome {
        fail(e);
    }
    Ok(())
}

fn load_settings(config: &CliConfig) -> scan_chef::Result<ServiceSettings> {
    match &config.config {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path);
            let file = TomlConfig::from_file(path)?;
            file.validate()?;
            Ok(file.service_settings())
        }
        None => Ok(ServiceSettings::from_env()),
    }
}

async fn connect(
    config: &CliConfig,
    settings: &ServiceSettings,
) -> scan_chef::Result<RecipeOrchestrator<SupabaseClient>> {
    if !settings.is_configured() {
        println!("ℹ️  Backend not configured, running in demo mode");
        return Ok(RecipeOrchestrator::offline());
    }

    let client = SupabaseClient::new(settings)?;
    if config.command.signs_in() {
        if let Some((email, password)) = credentials(config) {
            let user = client.sign_in_with_password(&email, &password).await?;
            tracing::info!("Signed in as {}", user.email.as_deref().unwrap_or(&user.id));
        }
    }

    Ok(RecipeOrchestrator::new(settings, client))
}

fn credentials(config: &CliConfig) -> Option<(String, String)> {
    Some((
        credential(&config.email, "SCAN_CHEF_EMAIL")?,
        credential(&config.password, "SCAN_CHEF_PASSWORD")?,
    ))
}

// 命令列參數優先於環境變數
fn credential(flag: &Option<String>, var: &str) -> Option<String> {
    flag.clone().or_else(|| std::env::var(var).ok())
}

async fn run(
    orchestrator: &RecipeOrchestrator<SupabaseClient>,
    config: &CliConfig,
) -> scan_chef::Result<()> {
    match config.command.clone() {
        Command::Generate { ingredients, save } => {
            let recipes = orchestrator.generate_recipes(&ingredients).await;
            if recipes.is_empty() {
                println!("No ingredients given, nothing to cook.");
                return Ok(());
            }
            print_recipes(&recipes);

            if save {
                for recipe in &recipes {
                    let saved = orchestrator.save_recipe(recipe).await?;
                    println!("💾 Saved #{} {}", saved.id, saved.title);
                }
            }
        }
        Command::Recipes => {
            print_recipes(&orchestrator.display_recipes().await);
        }
        Command::Ingredients => {
            let ingredients = orchestrator.list_ingredients().await?;
            if ingredients.is_empty() {
                println!("No ingredients stored yet.");
            }
            for ingredient in ingredients {
                println!(
                    "- {} (added {})",
                    ingredient.name,
                    ingredient.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::AddIngredients { names } => {
            let inserted = orchestrator.add_ingredients(&names).await?;
            println!("✅ Added {} ingredients", inserted.len());
        }
        Command::SignUp => {
            let email = credential(&config.email, "SCAN_CHEF_EMAIL");
            let password = credential(&config.password, "SCAN_CHEF_PASSWORD");
            let email = validate_required_field("email", &email)?;
            let password = validate_required_field("password", &password)?;

            match orchestrator.backend()?.sign_up(email, password).await? {
                Some(user) => println!("✅ Account created, signed in as {}", user.id),
                None => println!("📧 Check {} to confirm the account", email),
            }
        }
        Command::Whoami { refresh } => {
            let client = orchestrator.backend()?;
            if refresh {
                client.refresh_session().await?;
                println!("🔄 Session refreshed");
            }
            match client.current_user().await? {
                Some(user) => println!(
                    "👤 {} ({})",
                    user.email.as_deref().unwrap_or("no email"),
                    user.id
                ),
                None => println!("Not signed in."),
            }
        }
    }
    Ok(())
}

fn print_recipes(recipes: &[RecipeDraft]) {
    for (index, recipe) in recipes.iter().enumerate() {
        println!();
        println!("{}. {} [{} · {}]", index + 1, recipe.title, recipe.difficulty, recipe.time);
        println!("   {}", recipe.description);
        println!("   Ingredients: {}", recipe.ingredients.join(", "));
        println!("   Image: {}", recipe.image);
    }
}

fn drain_notices(notices: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        match notice.level {
            NoticeLevel::Info => println!("ℹ️  {}", notice.message),
            NoticeLevel::Warning => eprintln!("⚠️  {}", notice.message),
            NoticeLevel::Error => eprintln!("❌ {}", notice.message),
        }
    }
}

fn fail(e: ChefError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ scan-chef failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    if e.is_retryable() {
        eprintln!("🔁 This looks temporary, running the command again may succeed");
    }

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
