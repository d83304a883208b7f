//! Derive every tensor of the Schwarzschild metric and print the LaTeX.
//!
//! Run with `cargo run --example schwarzschild`.

use std::sync::Arc;
use std::time::Duration;

use grtensor::{presets, Event, TensorDerivationEngine};

fn main() {
    let def = match presets::preset("schwarzschild") {
        Some(def) => def,
        None => return,
    };
    let metric = match def.build() {
        Ok(metric) => Arc::new(metric),
        Err(e) => {
            eprintln!("{}", e.report(&def.metric));
            return;
        }
    };

    let engine = Arc::new(TensorDerivationEngine::new());
    let handle = match engine.spawn(metric) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    loop {
        match handle.recv_timeout(Duration::from_millis(100)) {
            Some(Event::Progress(report)) => {
                eprintln!("[{}/{}] {}", report.completed, report.total, report.stage);
                print!("{}", report.markup);
            }
            Some(Event::Done) => break,
            Some(Event::Cancelled) => {
                eprintln!("cancelled");
                break;
            }
            Some(Event::Failed(e)) => {
                eprintln!("failed: {}", e);
                break;
            }
            None => {}
        }
    }

    let outcome = handle.join();
    eprintln!("finished in {:.2?}", outcome.elapsed);
}
