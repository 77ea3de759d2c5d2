//! Basic example of the Miftah injector.

use std::sync::Arc;

use miftah::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserService {
    db: Arc<Database>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

const PLUGINS: &str = "plugins";

fn main() -> miftah::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("miftah_injector=debug")
        .init();

    // Build the injector
    let injector = Injector::create(vec![
        // Config — a pre-built value
        Provider::value_of(Config {
            database_url: "postgres://localhost/myapp".to_string(),
        })
        .into(),
        // Logger — bound behind its trait via an alias
        Provider::class(|| Ok(ConsoleLogger)).into(),
        Provider::existing(Token::of::<dyn Logger>(), Token::of::<ConsoleLogger>()).into(),
        // Database — depends on Config + the concrete logger
        Provider::class(|| {
            let config = inject_as::<Config>()?;
            let logger = inject_as::<ConsoleLogger>()?;
            Ok(Database {
                url: config.database_url.clone(),
                logger: logger as Arc<dyn Logger>,
            })
        })
        .into(),
        // UserService — a new instance on every lookup
        Provider::class(|| {
            let db = inject_as::<Database>()?;
            let logger = inject_as::<ConsoleLogger>()?;
            Ok(UserService {
                db,
                logger: logger as Arc<dyn Logger>,
            })
        })
        .transient()
        .into(),
        // Plugins — an ordered multi binding
        Provider::value(PLUGINS, "metrics".to_string()).multi().into(),
        Provider::value(PLUGINS, "audit".to_string()).multi().into(),
    ])?;

    println!("✅ Injector built: {injector:?}");

    let service: Arc<UserService> = injector.resolve()?;
    println!("👤 {}", service.get_user(42));

    // The alias resolves to the same cached logger instance
    let aliased = injector.get(Token::of::<dyn Logger>())?;
    if let Ok(logger) = aliased.downcast::<ConsoleLogger>() {
        logger.log("resolved through the dyn Logger alias");
    }

    for plugin in injector.resolve_all::<String>(PLUGINS)? {
        println!("🔌 plugin: {plugin}");
    }

    // === Override in a child injector (e.g. for a test harness) ===
    let child = injector.create_child(vec![
        Provider::value_of(Config {
            database_url: "sqlite::memory:".to_string(),
        })
        .into(),
        // Fresh database so the override takes effect despite caching
        Provider::class(|| {
            let config = inject_as::<Config>()?;
            let logger = inject_as::<ConsoleLogger>()?;
            Ok(Database {
                url: config.database_url.clone(),
                logger: logger as Arc<dyn Logger>,
            })
        })
        .into(),
    ])?;

    let db: Arc<Database> = child.resolve()?;
    println!("🧪 child database: {}", db.query("SELECT 1"));

    Ok(())
}
