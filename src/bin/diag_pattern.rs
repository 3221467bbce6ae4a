//! Diagnostic: load pattern files and print what was read.
//!
//! Usage: diag_pattern [--format ID] FILE...

use embroidery::io;

fn main() {
    let mut hint = None;
    let mut paths = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--format" {
            hint = args.next();
        } else {
            paths.push(arg);
        }
    }
    if paths.is_empty() {
        eprintln!("usage: diag_pattern [--format ID] FILE...");
        std::process::exit(2);
    }

    let mut fail = 0;
    for path in &paths {
        match io::load_file_with_notifications(path, hint.as_deref()) {
            Ok((pattern, notes)) => {
                let bounds = pattern
                    .bounds()
                    .map(|b| format!("{:.1}x{:.1}", b.width(), b.height()))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  OK  {path:<40} name={:?} layers={} threads={} stitches={} size={bounds}",
                    pattern.name,
                    pattern.layers.len(),
                    pattern.threads.len(),
                    pattern.stitch_count(),
                );
                if let Some(hoop) = pattern.hoop {
                    println!("      hoop {}", hoop);
                }
                for (i, thread) in pattern.threads.iter().enumerate() {
                    println!("      thread {i:>2}: {thread}");
                }
                for note in notes.iter() {
                    println!("      {note}");
                }
            }
            Err(e) => {
                println!("  FAIL {path:<39} {e}");
                fail += 1;
            }
        }
    }

    println!("\n--- Summary ---");
    println!("Total: {}, OK: {}, FAIL: {fail}", paths.len(), paths.len() - fail);
}
