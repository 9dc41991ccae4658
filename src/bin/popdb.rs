/*!
Bulk-load the database.

```bash
popdb config.toml accademici accademici.csv
popdb config.toml orari orari.toml
```

`accademici` reads academics from a CSV file; see
`Accademico::from_csv_line()` for the row format. Nobody is inserted
unless everybody can be.

`orari` reads programs, cohorts, years, rooms, courses and lessons from a
TOML file; see the `loader` module for the layout.
*/
use simplelog::{ColorChoice, TerminalMode, TermLogger};

use uniclass::{config::Cfg, loader, registry, store::Store};

async fn connect(cfg: &Cfg) -> Result<Store, String> {
    let store = Store::new(cfg.data_db_connect_string.clone());
    store.ensure_db_schema().await
        .map_err(|e| format!("Unable to ensure state of data DB: {}", &e))?;
    Ok(store)
}

async fn load_accademici(cfg: &Cfg, csv_path: &str) -> Result<String, String> {
    let text = std::fs::read_to_string(csv_path)
        .map_err(|e| format!("Unable to read {}: {}", csv_path, &e))?;
    let accademici = registry::parse_accademici_csv(&text)
        .map_err(|e| format!("Error in {}: {}", csv_path, &e))?;
    log::info!("Read {} Accademici from {}.", accademici.len(), csv_path);

    let store = connect(cfg).await?;
    let n = registry::register_accademici(&store, &accademici).await
        .map_err(|e| format!("Unable to insert Accademici: {}", &e))?;
    Ok(format!("Inserted {} Accademici.", n))
}

async fn load_orari(cfg: &Cfg, toml_path: &str) -> Result<String, String> {
    let text = std::fs::read_to_string(toml_path)
        .map_err(|e| format!("Unable to read {}: {}", toml_path, &e))?;
    let orari = loader::OrariFile::from_toml(&text)
        .map_err(|e| format!("Error in {}: {}", toml_path, &e))?;

    let store = connect(cfg).await?;
    let summary = loader::load_orari(&store, &orari).await
        .map_err(|e| format!("Unable to load {}: {}", toml_path, &e))?;
    Ok(format!("Inserted {}.", &summary))
}

async fn run(config_path: &str, mode: &str, data_path: &str) -> Result<String, String> {
    let cfg = Cfg::from_file_or_default(config_path)?;

    match mode {
        "accademici" => load_accademici(&cfg, data_path).await,
        "orari" => load_orari(&cfg, data_path).await,
        x => Err(format!("Unknown mode {:?}; expected \"accademici\" or \"orari\".", x)),
    }
}

#[tokio::main]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("uniclass")
        .add_filter_allow_str("popdb")
        .build();
    TermLogger::init(
        uniclass::log_level_from_env(),
        log_cfg,
        TerminalMode::Stderr,
        ColorChoice::Auto
    ).unwrap();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: {} CONFIG_FILE accademici|orari DATA_FILE", &args[0]);
        std::process::exit(2);
    }

    match run(&args[1], &args[2], &args[3]).await {
        Ok(msg) => { println!("{}", &msg); },
        Err(e) => {
            eprintln!("{}", &e);
            std::process::exit(1);
        },
    }
}
