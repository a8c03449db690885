use actix_web::{
    error, get, http::StatusCode, post, web, App, HttpResponse, HttpServer, Responder, Result,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::Write;
use std::sync::mpsc::SyncSender;
use tracing::info;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::config::CONFIG;
use crate::models::{task_dir, Status, TaskRegistry};

struct AppState {
    tasks: TaskRegistry,
    channel: SyncSender<Uuid>,
}

#[derive(Deserialize)]
struct ProcessParams {
    url: String,
    duration: Option<f64>,
}

#[derive(Serialize)]
struct ProcessResponse {
    task_id: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: Status,
    progress: u8,
    message: String,
    clips: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn not_found(description: &str) -> HttpResponse {
    HttpResponse::build(StatusCode::NOT_FOUND).json(ErrorResponse {
        error: description.to_owned(),
    })
}

#[post("/api/process")]
async fn process(
    data: web::Data<AppState>,
    params: web::Json<ProcessParams>,
) -> Result<impl Responder> {
    let duration = params.duration.unwrap_or(CONFIG.default_clip_duration);

    if !(duration > 0.0) {
        return Ok(HttpResponse::build(StatusCode::BAD_REQUEST).json(ErrorResponse {
            error: "duration must be a positive number of seconds".to_owned(),
        }));
    }

    let id = data.tasks.create(params.url.to_owned(), duration);

    info!("[{}] submitted source URL {}", id, params.url);

    data.channel
        .send(id)
        .map_err(|_| error::ErrorInternalServerError("Failed to internally queue"))?;

    Ok(HttpResponse::build(StatusCode::OK).json(ProcessResponse {
        task_id: id.to_string(),
    }))
}

#[get("/api/status/{task_id}")]
async fn status(data: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder> {
    for id in data
        .tasks
        .remove_expired(CONFIG.expire_completed_tasks_after)
    {
        // It doesn't matter whether the directory is still there or not.
        let _ = tokio::fs::remove_dir_all(task_dir(id)).await;
    }

    let Ok(id) = path.parse::<Uuid>() else {
        return Ok(not_found("Task not found"));
    };

    match data.tasks.get(id) {
        Some(task) => Ok(HttpResponse::build(StatusCode::OK).json(StatusResponse {
            status: task.status,
            progress: task.progress,
            message: task.message,
            clips: task.clips,
        })),
        None => Ok(not_found("Task not found")),
    }
}

#[get("/api/download/{task_id}/{filename}")]
async fn download_clip(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder> {
    let (task_id, filename) = path.into_inner();

    let Ok(id) = task_id.parse::<Uuid>() else {
        return Ok(not_found("File not found"));
    };

    // Only hand out clips the task has recorded; this also keeps arbitrary
    // path lookups out of the task directory.
    let known = data
        .tasks
        .get(id)
        .map_or(false, |task| task.clips.iter().any(|clip| clip == &filename));

    if !known {
        return Ok(not_found("File not found"));
    }

    match tokio::fs::read(task_dir(id).join(&filename)).await {
        Ok(bytes) => Ok(HttpResponse::build(StatusCode::OK)
            .content_type("video/mp4")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            ))
            .body(bytes)),
        Err(_) => Ok(not_found("File not found")),
    }
}

fn build_archive(id: Uuid, clips: &[String]) -> std::io::Result<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut archive = ZipWriter::new(&mut cursor);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for name in clips {
        archive
            .start_file(name.as_str(), options)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

        let bytes = std::fs::read(task_dir(id).join(name))?;
        archive.write_all(&bytes)?;
    }

    archive
        .finish()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    Ok(cursor.into_inner())
}

#[get("/api/download-all/{task_id}")]
async fn download_all(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder> {
    let Ok(id) = path.parse::<Uuid>() else {
        return Ok(not_found("Task not found"));
    };

    let Some(task) = data.tasks.get(id) else {
        return Ok(not_found("Task not found"));
    };

    let archive = web::block(move || build_archive(id, &task.clips)).await??;

    Ok(HttpResponse::build(StatusCode::OK)
        .content_type("application/zip")
        .insert_header(("Content-Disposition", "attachment; filename=\"clips.zip\""))
        .body(archive))
}

fn get_port() -> u16 {
    env::var("PORT")
        .map_err(|_| ())
        .and_then(|string| string.parse::<u16>().map_err(|_| ()))
        .unwrap_or(5000)
}

pub async fn start_web_server(tasks: TaskRegistry, tx: SyncSender<Uuid>) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState { tasks, channel: tx });
    let port = get_port();

    info!("Starting web server at 0.0.0.0:{}...", port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .service(process)
            .service(status)
            .service(download_clip)
            .service(download_all)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
