/*!
The dashboard web app. It serves a single page that renders the most recent recorded
run: a pie chart of the partition sizes, the run's parameters as json, and its
metrics, plus a small json api for the same record.
*/

use backtrace::Backtrace;
use futures::FutureExt;
use holystone_tracking::{RunRecord, Store};
use hyper::{
	header,
	service::{make_service_fn, service_fn},
	Body, Method, Request, Response, StatusCode,
};
use std::{cell::RefCell, convert::Infallible, panic::AssertUnwindSafe, path::PathBuf, sync::Arc};

mod page;

pub use self::page::{render_index, ArtifactPreview};

/// How many rows of the cleaned table the dashboard previews.
const PREVIEW_ROWS: usize = 5;

pub struct Options {
	pub host: std::net::IpAddr,
	pub port: u16,
	pub tracking_dir: PathBuf,
	pub experiment: String,
}

struct Context {
	options: Options,
	store: Store,
}

pub fn run(options: Options) -> anyhow::Result<()> {
	let mut runtime = tokio::runtime::Runtime::new()?;
	runtime.block_on(run_inner(options))
}

async fn run_inner(options: Options) -> anyhow::Result<()> {
	let store = Store::open(&options.tracking_dir)?;
	// Store the panic message and backtrace if a panic occurs while handling a
	// request, so it can be returned in the 500 response.
	tokio::task_local! {
		static PANIC_MESSAGE_AND_BACKTRACE: RefCell<Option<(String, Backtrace)>>;
	}
	let hook = std::panic::take_hook();
	std::panic::set_hook(Box::new(|panic_info| {
		let value = (panic_info.to_string(), Backtrace::new());
		PANIC_MESSAGE_AND_BACKTRACE.with(|panic_message_and_backtrace| {
			panic_message_and_backtrace.borrow_mut().replace(value);
		})
	}));
	let context = Arc::new(Context { options, store });
	let service = make_service_fn(|_| {
		let context = context.clone();
		async move {
			Ok::<_, Infallible>(service_fn(move |request| {
				let method = request.method().to_owned();
				let path = request.uri().path_and_query().unwrap().path().to_owned();
				let context = context.clone();
				PANIC_MESSAGE_AND_BACKTRACE.scope(RefCell::new(None), async move {
					let response = AssertUnwindSafe(handle(request, context))
						.catch_unwind()
						.await
						.unwrap_or_else(|_| {
							let backtrace =
								PANIC_MESSAGE_AND_BACKTRACE.with(|panic_message_and_backtrace| {
									let panic_message_and_backtrace =
										panic_message_and_backtrace.borrow();
									let (message, backtrace) =
										panic_message_and_backtrace.as_ref().unwrap();
									format!("{}\n{:?}", message, backtrace)
								});
							eprintln!("{} {} 500", method, path);
							Response::builder()
								.status(StatusCode::INTERNAL_SERVER_ERROR)
								.body(Body::from(backtrace))
								.unwrap()
						});
					Ok::<_, Infallible>(response)
				})
			}))
		}
	});
	let addr = std::net::SocketAddr::new(context.options.host, context.options.port);
	let listener = std::net::TcpListener::bind(&addr)?;
	eprintln!("serving on port {}", context.options.port);
	hyper::Server::from_tcp(listener)?.serve(service).await?;
	std::panic::set_hook(hook);
	Ok(())
}

async fn handle(request: Request<Body>, context: Arc<Context>) -> Response<Body> {
	let method = request.method().clone();
	let path = request.uri().path_and_query().unwrap().path().to_owned();
	let path_components: Vec<_> = path.split('/').skip(1).collect();
	let response = match (&method, path_components.as_slice()) {
		(&Method::GET, [""]) => index(&context),
		(&Method::GET, ["api", "runs", "latest"]) => api_latest_run(&context),
		_ => Response::builder()
			.status(StatusCode::NOT_FOUND)
			.body(Body::from("not found"))
			.unwrap(),
	};
	eprintln!("{} {} {}", method, path, response.status());
	response
}

fn index(context: &Context) -> Response<Body> {
	match context.store.latest_run(&context.options.experiment) {
		Ok(record) => {
			let preview = record
				.as_ref()
				.and_then(|record| read_artifact_preview(&context.store, record));
			let html = page::render_index(
				&context.options.experiment,
				record.as_ref(),
				preview.as_ref(),
			);
			Response::builder()
				.status(StatusCode::OK)
				.header(header::CONTENT_TYPE, "text/html; charset=utf-8")
				.body(Body::from(html))
				.unwrap()
		}
		Err(error) => internal_server_error(error),
	}
}

/// Read the first rows of the run's cleaned csv artifact. A run without a csv
/// artifact, or one whose artifact has gone missing, simply gets no preview.
fn read_artifact_preview(store: &Store, record: &RunRecord) -> Option<ArtifactPreview> {
	let file_name = record
		.artifacts
		.iter()
		.find(|file_name| file_name.ends_with(".csv"))?;
	let path = store.artifact_path(record, file_name);
	let mut reader = csv::Reader::from_path(path).ok()?;
	let header: Vec<String> = reader
		.headers()
		.ok()?
		.into_iter()
		.map(|column_name| column_name.to_owned())
		.collect();
	let mut rows = Vec::new();
	for result in reader.records().take(PREVIEW_ROWS) {
		let record = result.ok()?;
		rows.push(record.iter().map(|cell| cell.to_owned()).collect());
	}
	Some(ArtifactPreview {
		file_name: file_name.clone(),
		header,
		rows,
	})
}

fn api_latest_run(context: &Context) -> Response<Body> {
	match context.store.latest_run(&context.options.experiment) {
		Ok(Some(record)) => Response::builder()
			.status(StatusCode::OK)
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(serde_json::to_string_pretty(&record).unwrap()))
			.unwrap(),
		Ok(None) => Response::builder()
			.status(StatusCode::NOT_FOUND)
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from("{\"error\":\"no runs recorded\"}"))
			.unwrap(),
		Err(error) => internal_server_error(error),
	}
}

fn internal_server_error(error: anyhow::Error) -> Response<Body> {
	Response::builder()
		.status(StatusCode::INTERNAL_SERVER_ERROR)
		.body(Body::from(error.to_string()))
		.unwrap()
}
