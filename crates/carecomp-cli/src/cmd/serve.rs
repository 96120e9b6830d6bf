use anyhow::Context;
use carecomp_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, bind: Option<&str>, port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    for w in config.validate() {
        tracing::warn!("config: {}", w.message);
    }
    let bind = bind.unwrap_or(&config.server.bind).to_string();
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
            .await
            .with_context(|| format!("failed to bind {bind}:{port}"))?;
        println!(
            "carecomp '{}' serving on http://{}",
            config.instance.name,
            listener.local_addr()?
        );

        tokio::select! {
            res = carecomp_server::serve_on(root_buf, listener) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
