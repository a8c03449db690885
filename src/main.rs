use std::sync::mpsc;
use std::thread;

use tracing_subscriber::EnvFilter;

use crate::models::TaskRegistry;
use crate::processor::processor;
use crate::web::start_web_server;

mod command;
mod config;
mod error;
mod geometry;
mod models;
mod planner;
mod processor;
mod web;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    std::fs::create_dir_all("data")?;
    std::env::set_current_dir("data").expect("Failed trying to change to a directory called `data`.  Make a `data` directory inside the current working directory so clipserve has somewhere to store downloads and clips.");

    let (tx, rx) = mpsc::sync_channel(1024 * 50);

    let tasks = TaskRegistry::new();
    let tasks_clone = tasks.clone();

    thread::spawn(move || processor(rx, tasks_clone));

    start_web_server(tasks, tx).await
}
