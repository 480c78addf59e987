use gmes::prelude::*;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    // Minimal demo:
    // - four slots, one seed expert, a 1-D scalar predictor per slot
    // - the input alternates between two regimes in long blocks
    // - each regime shift drains the current winner's capacity until a
    //   new expert is grown for the unfamiliar region

    let cfg = GmesConfig::with_size(4, 1)
        .with_seed(42)
        .with_learning_rate(1.0)
        .with_capacity(1.0, 0.65);
    let predictors: Vec<ScalarPredictor> = (0..cfg.max_experts)
        .map(|_| ScalarPredictor::new(0.1))
        .collect();
    let mut gmes = Gmes::new(cfg, predictors, ()).expect("valid demo config");

    let regimes = [0.2, 0.8, 0.5, 0.95];
    for t in 0..800usize {
        let input = [regimes[(t / 200) % regimes.len()]];
        gmes.execute_cycle(&input);

        if gmes.has_new_node() {
            let line = serde_json::to_string(&gmes.diagnostics()).expect("serialize diagnostics");
            println!("{}", line);
        }
    }

    let snapshot = GmesAdapter::new(&gmes).snapshot();
    let line = serde_json::to_string_pretty(&snapshot).expect("serialize snapshot");
    println!("{}", line);
}

fn print_help() {
    println!("gmes demo");
    println!();
    println!("Runs a growing multi-expert structure over a blockwise-shifting");
    println!("1-D input, printing diagnostics on every growth event and a");
    println!("final snapshot as JSON.");
    println!();
    println!("Usage:");
    println!("  gmes          run the demo");
    println!("  gmes --help   show this help");
}
