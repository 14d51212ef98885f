use anyhow::Context;
use log::info;
use tokio::{net::TcpListener, runtime::Runtime};

use housing_service::{
    ModelHandle, Readiness, ServiceConfig, dataset, http, lifecycle,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServiceConfig::from_env().context("reading configuration")?;
    info!(
        "model at {}, {} loading, dataset {:?}",
        config.model_path.display(),
        config.model_loading,
        config.dataset
    );

    // training is blocking and CPU bound, so it runs before the runtime exists
    let source = dataset::from_config(&config.dataset);
    let readiness =
        lifecycle::ensure_model_ready(&config.model_path, &config.training, source.as_ref())
            .context("preparing the model artifact")?;

    if let Readiness::Trained(report) = &readiness {
        info!(
            "trained on {} rows, {} held out",
            report.train_rows, report.test_rows
        );
    }

    let model = ModelHandle::open(&config.model_path, config.model_loading)
        .with_context(|| format!("opening {}", config.model_path.display()))?;

    let runtime = Runtime::new().context("starting the async runtime")?;
    runtime.block_on(async {
        let addr = config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;

        http::serve(listener, http::router(model)).await?;
        Ok(())
    })
}
