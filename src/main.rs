use cubegen::gen::{gen, GenOptions};

fn main() {
    let mut args = pico_args::Arguments::from_env();
    let n: usize = args
        .value_from_str("-n")
        .expect("Error parsing number of cubes (-n)");
    let threads: usize = args
        .opt_value_from_str("-t")
        .expect("Error parsing number of threads (-t)")
        .unwrap_or(1);
    let use_cache: bool = args
        .opt_value_from_str("-c")
        .expect("Error parsing -c")
        .unwrap_or(false);
    let write_cache: bool = args
        .opt_value_from_str("-w")
        .expect("Error parsing -w")
        .unwrap_or(false);
    let split_cache: bool = args
        .opt_value_from_str("-s")
        .expect("Error parsing -s")
        .unwrap_or(false);
    let base_path: std::path::PathBuf = args
        .opt_value_from_str("-p")
        .expect("Error parsing cache path (-p)")
        .unwrap_or_else(|| "cache".into());

    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .unwrap();

    let now = std::time::Instant::now();

    println!("enumerating up to n = {n}...");

    let opts = GenOptions {
        use_cache,
        write_cache,
        split_cache,
        base_path,
    };
    if let Err(e) = gen(n, threads, &opts) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    println!("total time: {:?}", now.elapsed());
}
