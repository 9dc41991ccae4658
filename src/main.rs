/*!
The UniClass web server.

```bash
uniclass [ config.toml ]
```
*/
use std::sync::Arc;

use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tokio::sync::RwLock;
use tower_http::services::ServeDir;

use uniclass::{config, inter};

static DEFAULT_CONFIG_FILE: &str = "config.toml";

fn die(msg: &str) -> ! {
    log::error!("{}", msg);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("uniclass")
        .build();
    TermLogger::init(
        uniclass::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();
    log::info!("Logging started.");

    let config_path = std::env::args().nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_owned());
    let cfg = config::Cfg::from_file_or_default(&config_path)
        .unwrap_or_else(|e| die(&e));
    log::info!("Configuration:\n{:#?}", &cfg);

    inter::init(&cfg.templates_dir).unwrap_or_else(|e| die(&e));

    let glob = config::load_configuration(&cfg).await
        .unwrap_or_else(|e| die(&e));
    let addr = glob.addr;
    let glob = Arc::new(RwLock::new(glob));

    let app = inter::router(glob)
        .nest_service("/static", ServeDir::new(&cfg.static_dir));

    log::info!("Listening on {}", &addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap_or_else(|e| die(&format!("Server error: {}", &e)));
}
