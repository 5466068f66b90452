use std::io::{self, BufRead, Write};

use botlisp::{
    fmt::pretty,
    options::{Options, USAGE},
    prelude::*,
};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn report(err: &Error) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stderr, "error");
    let _ = stderr.reset();
    let _ = writeln!(stderr, ": {}", err);
}

fn show(cx: &Context, value: Value) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    if pretty(cx, value, &mut stdout).is_ok() {
        let _ = writeln!(stdout);
    }
}

fn run_repl(cx: &mut Context, env: EnvRef) {
    let mut repl = Repl::new(env);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}", repl.prompt());
        let _ = io::stdout().flush();
        let Some(Ok(line)) = lines.next() else {
            println!();
            break;
        };
        match repl.feed(cx, &line) {
            ReplOutcome::NeedMore => (),
            ReplOutcome::Value(text) => println!("{}", text),
            ReplOutcome::Error(err) => report(&err),
        }
    }
}

fn main() {
    env_logger::init();

    let options = match Options::parse() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}\n{}", err, USAGE);
            std::process::exit(2);
        }
    };
    if options.help {
        println!("{}", USAGE);
        return;
    }

    log::debug!(target: "botlisp", "heap config: {:?}", options.heap);
    let mut cx = Context::new(options.heap);
    let env = cx.create_global_env();

    let mut failed = false;
    if let Some(path) = &options.filename {
        if let Err(err) = cx.eval_file(path, env) {
            report(&err);
            failed = true;
        }
    }
    if let (false, Some(expr)) = (failed, &options.expr) {
        match cx.eval_source(expr, env) {
            Ok(value) => show(&cx, value),
            Err(err) => {
                report(&err);
                failed = true;
            }
        }
    }
    if options.filename.is_none() && options.expr.is_none() {
        run_repl(&mut cx, env);
    }

    if options.stats {
        let stats = cx.stats();
        eprintln!(
            "heap: {} live objects, {} bytes allocated, next collection at {} bytes, {} collections, {} objects allocated in total",
            stats.live_objects,
            stats.bytes_allocated,
            stats.next_threshold,
            stats.collections,
            stats.total_allocated
        );
    }
    if failed {
        std::process::exit(1);
    }
}
