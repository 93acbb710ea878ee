use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	exam_worker::run(exam_worker::Args::parse()).await
}
