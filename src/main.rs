#[macro_use]
extern crate log;

use std::process;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use xmlrpc_multicall::xmlrpc::{DateFormatter, Nil, Request, Response, Value};
use xmlrpc_multicall::{Client, ClientConfig};

#[derive(Debug, Parser)]
#[command(
    name = "xmlrpc-call",
    version,
    author = "Damien Lecan <dev@dlecan.com>",
    about = "Call XML-RPC methods, one at a time or batched with system.multicall"
)]
struct Cli {
    /// Endpoint, e.g. "http://localhost:9001/RPC2"
    url: String,

    /// Method to call
    method: Option<String>,

    /// Parameters, optionally typed with a prefix: i: d: b: s: t: (date) n: (nil)
    params: Vec<String>,

    /// Add a call to a multicall batch, as METHOD[:ARG,..]
    #[arg(short, long, value_name = "CALL")]
    multicall: Vec<String>,

    /// Encoding label for the XML declaration
    #[arg(short, long)]
    encoding: Option<String>,

    /// Extra HTTP header, as NAME:VALUE
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Verbose mode, repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

/// Reads one command-line parameter into a value.
fn parse_param(arg: &str, dates: &DateFormatter) -> Result<Value, String> {
    let invalid = |kind: &str| format!("{:?} is not a valid {}", arg, kind);
    match arg.split_once(':') {
        Some(("i", v)) => v.parse::<i32>().map(Value::Int).map_err(|_| invalid("int")),
        Some(("d", v)) => v.parse::<f64>().map(Value::Double).map_err(|_| invalid("double")),
        Some(("b", v)) => match v {
            "1" | "true" => Ok(Value::Boolean(true)),
            "0" | "false" => Ok(Value::Boolean(false)),
            _ => Err(invalid("boolean")),
        },
        Some(("s", v)) => Ok(Value::from(v)),
        Some(("t", v)) => dates.decode(v).map(Value::DateTime).map_err(|e| e.to_string()),
        Some(("n", "")) => Ok(Value::custom(&Nil)),
        Some(("n", _)) => Err(invalid("nil")),
        _ => Ok(infer(arg)),
    }
}

fn infer(arg: &str) -> Value {
    if let Ok(n) = arg.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = arg.parse::<f64>() {
        return Value::Double(n);
    }
    match arg {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::from(arg),
    }
}

/// `METHOD[:ARG,..]`
fn parse_call(spec: &str, dates: &DateFormatter) -> Result<Request, String> {
    let (method, args) = match spec.split_once(':') {
        Some((method, args)) => (method, Some(args)),
        None => (spec, None),
    };
    if method.is_empty() {
        return Err(format!("no method name in {:?}", spec));
    }
    let mut request = Request::new(method);
    if let Some(args) = args {
        for arg in args.split(',').filter(|a| !a.is_empty()) {
            request = request.argument(parse_param(arg, dates)?);
        }
    }
    Ok(request)
}

fn parse_header(header: &str) -> Result<(&str, &str), String> {
    match header.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(format!("header {:?} is not NAME:VALUE", header)),
    }
}

/// Prints one outcome; returns false for a fault.
fn report(response: &Response) -> bool {
    match *response {
        Ok(ref value) => {
            println!("{}", value);
            true
        }
        Err(ref fault) => {
            eprintln!("{}", fault);
            false
        }
    }
}

fn run(cli: Cli) -> Result<bool, String> {
    let dates = DateFormatter::default();

    let mut config = ClientConfig::new(&cli.url);
    if let Some(ref encoding) = cli.encoding {
        config = config.encoding(encoding);
    }
    for header in &cli.headers {
        let (name, value) = parse_header(header)?;
        config = config.header(name, value);
    }
    let mut registry = config.custom_types.clone();
    registry.register_nil().map_err(|e| e.to_string())?;
    config = config.custom_types(registry);
    let client = Client::from_config(config);

    let mut calls = Vec::new();
    if let Some(ref method) = cli.method {
        let mut request = Request::new(method);
        for param in &cli.params {
            request = request.argument(parse_param(param, &dates)?);
        }
        calls.push(request);
    }
    for spec in &cli.multicall {
        calls.push(parse_call(spec, &dates)?);
    }

    if cli.multicall.is_empty() {
        let request = match calls.pop() {
            Some(request) => request,
            None => return Err("no method given".to_string()),
        };
        debug!("Calling {} with {} parameter(s)", request.method, request.params.len());
        let response = client.call(&request).map_err(|e| e.to_string())?;
        return Ok(report(&response));
    }

    debug!("Batching {} call(s)", calls.len());
    let responses = client.multi_method_call(&calls).map_err(|e| e.to_string())?;
    let mut all_ok = true;
    for response in &responses {
        all_ok &= report(response);
    }
    Ok(all_ok)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            process::exit(2);
        }
    }
}
