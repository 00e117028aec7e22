//! Runs one generation cycle against an in-memory history and watches progress.
//!
//! Run with: `cargo run --example generate_image`
//!
//! Requires `API_KEY`, `GEMINI_API_KEY` or `GOOGLE_API_KEY`.

use warrick::{
    AspectRatio, ControllerConfig, CycleOutcome, GeminiProvider, GenerationController,
    HistoryStore, MemoryStorage,
};

#[tokio::main]
async fn main() -> warrick::Result<()> {
    let provider = GeminiProvider::builder().build()?;
    let controller = GenerationController::new(
        provider,
        HistoryStore::load(MemoryStorage::new()),
        ControllerConfig::default(),
    );

    controller.set_prompt("A golden retriever puppy playing in snow");
    controller.set_aspect_ratio(AspectRatio::Landscape);

    let mut rx = controller.subscribe();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let s = rx.borrow_and_update().clone();
            println!("{:?} {:.0}%", s.phase, s.progress);
        }
    });

    let outcome = controller.generate().await;
    watcher.abort();

    if let CycleOutcome::Committed(entry) = outcome? {
        let image = entry.payload()?;
        image.save("output.jpg")?;
        println!(
            "Stored {}: {} bytes, format: {:?}",
            entry.id,
            image.size(),
            image.format
        );
    }

    Ok(())
}
