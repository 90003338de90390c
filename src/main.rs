use std::sync::Arc;

use afu_assistant::config::AssistantConfig;
use afu_assistant::gateway::{AssistantGateway, HttpBackend, ModelTier};
use afu_assistant::log::{ConversationLog, LibSqlLog, MemoryLog};
use afu_assistant::message::ConversationKey;
use afu_assistant::notify::Notifier;
use afu_assistant::tools::{
    HttpFetcher, InMemoryCatalog, InMemoryDirectory, ProductSummary, Toolbox, UserProfile,
};
use afu_assistant::turn::{TurnEngine, UserTurn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let api_key = std::env::var("AFU_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: AFU_API_KEY not set");
        eprintln!("  export AFU_API_KEY=sk-...");
        std::process::exit(1);
    });

    let mut config = AssistantConfig {
        api_key: secrecy::SecretString::from(api_key),
        ..AssistantConfig::default()
    };
    if let Ok(base) = std::env::var("AFU_API_BASE") {
        config.api_base = base;
    }
    if let Ok(model) = std::env::var("AFU_BASE_MODEL") {
        config.base_model = model;
    }
    if let Ok(model) = std::env::var("AFU_ADVANCED_MODEL") {
        config.advanced_model = model;
    }

    let tier = match std::env::var("AFU_TIER").as_deref() {
        Ok("advanced") => ModelTier::Advanced,
        _ => ModelTier::Base,
    };

    let user_id = std::env::var("AFU_USER").unwrap_or_else(|_| "local-user".to_string());

    // Durable log when a path is configured, otherwise in-memory.
    let log: Arc<dyn ConversationLog> = match std::env::var("AFU_DB_PATH") {
        Ok(path) => {
            let log = LibSqlLog::new_local(std::path::Path::new(&path)).await?;
            eprintln!("   Log: {path}");
            Arc::new(log)
        }
        Err(_) => {
            eprintln!("   Log: in-memory (set AFU_DB_PATH for a durable log)");
            Arc::new(MemoryLog::new())
        }
    };

    // Demo directory and catalog; a deployment wires the real stores here.
    let toolbox = Arc::new(Toolbox::new(
        Arc::new(InMemoryDirectory::new(vec![
            UserProfile {
                id: "u1".into(),
                name: "Alice".into(),
                bio: Some("Afu early adopter".into()),
            },
            UserProfile {
                id: "u2".into(),
                name: "Bob".into(),
                bio: None,
            },
        ])),
        Arc::new(InMemoryCatalog::new(vec![ProductSummary {
            id: "p1".into(),
            name: "Vintage Camera".into(),
            description: "A well-kept film camera from the 70s".into(),
            price_cents: 12_000,
        }])),
        Arc::new(HttpFetcher::default()),
    ));

    let backend = Arc::new(HttpBackend::new(&config));
    let gateway = Arc::new(AssistantGateway::new(
        backend,
        Arc::clone(&toolbox),
        config.clone(),
    ));

    let (notifier, mut notices) = Notifier::channel(64);
    let engine = Arc::new(TurnEngine::new(
        Arc::clone(&log),
        gateway,
        toolbox,
        notifier,
        config.clone(),
    ));

    eprintln!("AfuAi assistant v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Tier: {tier:?} (base: {}, advanced: {})", config.base_model, config.advanced_model);
    eprintln!("   User: {user_id}");
    eprintln!("   Type a message and press Enter. Ctrl+D to exit.\n");

    // Toast consumer.
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            eprintln!("[{}] {}", notice.title, notice.body);
        }
    });

    // Log subscriber — prints every append, the way any viewer observes it.
    let key = ConversationKey::for_assistant(&user_id);
    let mut subscription = log.subscribe(&key).await;
    tokio::spawn(async move {
        while let Some(message) = subscription.next().await {
            println!("{}: {}", message.sender.as_str(), message.text);
        }
    });

    // One turn per line of stdin; the engine rejects overlapping turns for
    // the same conversation, so we simply run them sequentially.
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin);
    let mut line = String::new();
    loop {
        line.clear();
        use tokio::io::AsyncBufReadExt;
        if lines.read_line(&mut line).await? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let turn = UserTurn::text_only(&user_id, text, tier);
        if let Err(e) = engine.submit(&key, turn).await {
            tracing::error!(error = %e, "Turn failed");
        }
    }

    eprintln!("Bye.");
    Ok(())
}
