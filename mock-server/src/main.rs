use serde_json::Value;
use tokio::net::TcpListener;

/// Serves the document API on `PORT` (default 3000). When `SEED_FILE` names a
/// JSON array, its objects are loaded as the initial documents.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let documents = match std::env::var("SEED_FILE") {
        Ok(path) => {
            let raw = std::fs::read(&path)?;
            serde_json::from_slice::<Vec<Value>>(&raw)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        }
        Err(_) => Vec::new(),
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr} with {} documents", documents.len());
    mock_server::serve(listener, mock_server::app_with(documents)).await
}
