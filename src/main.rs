use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use recsync::audio::{self, DEVICE_FORMAT};
use recsync::config::Config;
use recsync::emulator::LoopbackDevice;
use recsync::logging::init_tracing;
use recsync::progress::CliProgressCallback;
use recsync::protocol::{self, Request, Response};
use recsync::sync::SyncBuilder;

///////////////////////
// Utility functions //
///////////////////////

fn load_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => Config::load(Path::new(path))?,
		None => Config::default(),
	};
	if matches.get_flag("verbose") {
		config.log_level = "debug".to_string();
	}
	Ok(config)
}

fn decode_frame(hex_text: &str) -> Result<(), Box<dyn Error>> {
	let cleaned: String = hex_text.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
	let bytes = hex::decode(&cleaned).map_err(|e| format!("invalid hex: {}", e))?;
	let frame = protocol::decode(&bytes).ok_or("not a complete frame")?;

	println!("sequence: {}", frame.sequence());
	println!("checksum: {:#06x} ({})", frame.checksum(), if frame.is_valid() { "valid" } else { "INVALID" });
	println!("length:   {}", frame.length());
	println!("payload:  {}", hex::encode(frame.payload()));
	if frame.wire_len() < bytes.len() {
		println!("trailing: {} bytes", bytes.len() - frame.wire_len());
	}
	match (Response::parse(&frame), Request::parse(&frame)) {
		(Ok(response), _) => println!("response: {:?}", response),
		(_, Ok(request)) => println!("request:  {:?}", request),
		(Err(e), Err(_)) => println!("message:  {}", e),
	}
	Ok(())
}

fn wrap_pcm(input: &str, output: &str) -> Result<(), Box<dyn Error>> {
	let pcm = fs::read(input).map_err(|e| format!("Cannot read {}: {}", input, e))?;
	let wav = audio::convert_to_container(&[&pcm]);
	fs::write(output, &wav).map_err(|e| format!("Cannot write {}: {}", output, e))?;
	eprintln!(
		"{}: {} bytes of PCM, {}s at {} Hz",
		output,
		pcm.len(),
		DEVICE_FORMAT.duration_secs(pcm.len() as u64),
		DEVICE_FORMAT.sample_rate
	);
	Ok(())
}

async fn simulate(mut config: Config, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	if let Some(files) = matches.get_one::<usize>("files") {
		config.emulator.file_count = *files;
	}
	if let Some(out) = matches.get_one::<String>("out") {
		config.output_dir = PathBuf::from(out);
	}
	let json = matches.get_flag("json");
	config.validate()?;
	fs::create_dir_all(&config.output_dir)
		.map_err(|e| format!("Cannot create {}: {}", config.output_dir.display(), e))?;

	let device = LoopbackDevice::from_config(&config.emulator);
	let display = CliProgressCallback::new(config.output_dir.clone()).quiet(json);
	let summary = SyncBuilder::new()
		.config(config)
		.callbacks(Box::new(display))
		.run(device)
		.await
		.map_err(|e| e.user_message())?;

	if json {
		println!("{}", serde_json::to_string_pretty(&summary)?);
	}
	if summary.failed() > 0 || summary.aborted {
		let missing = summary.requested() - summary.completed();
		return Err(format!("{} of {} recordings not saved", missing, summary.requested()).into());
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("recsync")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilu@symbion.hu>")
		.about("Recording device sync utility")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("PATH")
				.global(true)
				.help("Config file (TOML, or JSON with a .json extension)"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Debug logging"),
		)
		.subcommand(
			Command::new("decode")
				.about("Decode a hex-encoded frame")
				.arg(Arg::new("hex").required(true).value_name("HEX")),
		)
		.subcommand(
			Command::new("wrap")
				.about("Wrap a raw PCM dump in a WAVE container")
				.arg(Arg::new("input").required(true).value_name("INPUT.pcm"))
				.arg(Arg::new("output").required(true).value_name("OUTPUT.wav")),
		)
		.subcommand(
			Command::new("simulate")
				.about("Run a full session against the loopback device")
				.arg(
					Arg::new("files")
						.long("files")
						.value_name("N")
						.value_parser(clap::value_parser!(usize))
						.help("Recordings on the emulated device"),
				)
				.arg(Arg::new("out").long("out").value_name("DIR").help("Output directory"))
				.arg(
					Arg::new("json")
						.long("json")
						.action(ArgAction::SetTrue)
						.help("Print the batch summary as JSON"),
				),
		)
		.get_matches();

	// Global flags propagate into the subcommand matches
	let (name, sub) = matches.subcommand().ok_or("a subcommand is required")?;
	let config = load_config(sub)?;
	init_tracing(&config.log_level, config.log_format);

	match name {
		"decode" => {
			let hex_text = sub.get_one::<String>("hex").ok_or("decode: frame argument required")?;
			decode_frame(hex_text)?;
		}
		"wrap" => {
			let input = sub.get_one::<String>("input").ok_or("wrap: input argument required")?;
			let output = sub.get_one::<String>("output").ok_or("wrap: output argument required")?;
			wrap_pcm(input, output)?;
		}
		"simulate" => simulate(config, sub).await?,
		other => return Err(format!("unknown subcommand {}", other).into()),
	}

	Ok(())
}

// vim: ts=4
