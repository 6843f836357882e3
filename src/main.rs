use log::info;
use p1gateway::{relay, ApiManager, DsmrManager, RelayManager, SourceManager};
use std::{env, time::Duration};
use tokio::task::JoinHandle;


#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("P1G_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    env::set_var("RUST_BACKTRACE", "1");

    // Channel between the P1 source and the telegram dispatch loop
    let (tx, rx) = tokio::sync::mpsc::channel(10);

    // The consumer slot is shared between the relay accept loop and the
    // dispatch loop
    let slot = relay::shared_slot();

    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    let mut source = SourceManager::new(tx);
    threads.push(tokio::spawn(async move {
        source.start_thread().await;
    }));

    let mut dsmr = DsmrManager::new(rx, slot.clone());
    threads.push(tokio::spawn(async move {
        dsmr.start_thread().await;
    }));

    let relay = RelayManager::new(slot);
    threads.push(tokio::spawn(async move {
        relay.start_thread().await;
    }));

    /* Run our api gateway now */
    let api = ApiManager::new();
    threads.push(tokio::spawn(async move {
        api.start_thread().await;
    }));

    info!("All modules started, now waiting for a signal to exit");
    loop {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut kill_all_tasks = false;
        for task in threads.iter() {
            if task.is_finished() {
                kill_all_tasks = true;
            }
        }

        if kill_all_tasks == true {
            for task in threads.iter_mut() {
                task.abort();
            }
            break;
        }
    }
    Ok(())
}
