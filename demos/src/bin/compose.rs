//! Builds registries by composition: later registrations override earlier
//! ones, and the resulting values stay independent.

use uriopen::{OpenerRegistry, SharedRegistry, UnknownSchemeError, open_fn, read_to_bytes};
use uriopen_memory::MemoryOpener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let primary = MemoryOpener::new();
    primary.insert("greeting", "hello from primary").await;
    let fallback = MemoryOpener::new();
    fallback.insert("greeting", "hello from fallback").await;

    let base = fallback.register(OpenerRegistry::new());
    let layered = primary.register(base.clone());

    for (label, registry) in [("base", &base), ("layered", &layered)] {
        let content = read_to_bytes(registry.resolve("memory://greeting").await?).await?;
        println!("{label}: {}", String::from_utf8_lossy(&content));
    }

    // Handlers can be plain closures.
    let echo = open_fn(|uri: String| async move { Ok(uriopen::stream_from_bytes(uri)) });
    let shared = SharedRegistry::from(layered);
    shared.register("echo", echo);

    let content = read_to_bytes(shared.resolve("echo://anything/at/all").await?).await?;
    println!("echo: {}", String::from_utf8_lossy(&content));

    match shared.resolve("gopher://example.com").await {
        Ok(_) => anyhow::bail!("gopher should not be registered"),
        Err(err) => match err.downcast_ref::<UnknownSchemeError>() {
            Some(unknown) => println!("unknown scheme: {}", unknown.scheme()),
            None => return Err(err),
        },
    }

    Ok(())
}
