use base64::{engine::general_purpose::STANDARD, Engine as _};
use poseshift::{logger, Config, ImagePayload, PoseTransferRequest, RequestHandler};
use std::env;
use std::fs;
use std::path::Path;

const USAGE: &str = "usage: poseshift <user-image> <pose-image> [output.png]
       poseshift serve";

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

fn load_image(path: &str) -> Result<ImagePayload, Box<dyn std::error::Error>> {
    let path = Path::new(path);
    let bytes = fs::read(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    Ok(ImagePayload::new(STANDARD.encode(bytes), mime_for(path)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    logger::init_with_config(logger::LoggerConfig::from_env())?;
    if !dotenv_loaded {
        log::warn!("No .env file found, using system environment variables");
    }

    let config = Config::from_env();
    logger::log_config_info(&config);

    let handler = match RequestHandler::from_config(&config) {
        Ok(handler) => handler,
        Err(e) => {
            log::error!("Failed to initialize: {}", e);
            return Err(e.into());
        }
    };

    let args: Vec<String> = env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("serve") {
        #[cfg(feature = "server")]
        {
            poseshift::server::run(handler.clone(), config.port.unwrap_or(8080)).await?;
            handler.shutdown().await;
            return Ok(());
        }
        #[cfg(not(feature = "server"))]
        {
            return Err("built without the `server` feature".into());
        }
    }

    let (user_path, pose_path) = match (args.first(), args.get(1)) {
        (Some(user), Some(pose)) => (user, pose),
        _ => {
            eprintln!("{}", USAGE);
            return Err("missing image arguments".into());
        }
    };
    let output_path = args.get(2).map(String::as_str).unwrap_or("generated.png");

    let request = PoseTransferRequest {
        user_image: load_image(user_path)?,
        pose_image: load_image(pose_path)?,
    };

    let outcome = {
        let _timer = logger::timer("pose transfer");
        handler.handle(&request).await
    };
    handler.shutdown().await;
    let outcome = outcome?;

    match (outcome.generated_image, outcome.error) {
        (Some(image), _) => {
            fs::write(output_path, STANDARD.decode(image)?)?;
            log::info!("Generated image written to {}", output_path);
            if let Some(description) = outcome.pose_description {
                log::info!("Pose used:\n{}", description);
            }
            Ok(())
        }
        (None, error) => {
            let message = error.unwrap_or_else(|| "unknown failure".to_string());
            log::error!("Pose transfer failed: {}", message);
            Err(message.into())
        }
    }
}
