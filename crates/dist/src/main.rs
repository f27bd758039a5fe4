//! The binary hashring-dist.
//!
//! Places a set of random servers on a ring, spreads a large number of
//! random objects across them, and reports how evenly the objects land
//! for every magic factor in the requested set. The output is a
//! `factor,stddev%,latency_ms` CSV, which is how the default magic factor
//! was picked in the first place: scan a factor range, look for the knee
//! where extra points stop buying a flatter distribution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::BuildHasher;
use std::net::Ipv4Addr;
use std::sync::{mpsc, Mutex};
use std::time::{Duration, Instant};

use hashring::{DefaultHashBuilder, Ring};
use rand::Rng;
use siphasher::sip::SipHasher13;

#[derive(clap::Parser, Debug)]
#[command(version, about = "Measure ring distribution quality per magic factor")]
struct Args {
    /// Number of servers to place on each ring.
    #[arg(long, default_value_t = 10)]
    servers: usize,

    /// Number of objects to spread across the servers.
    #[arg(long, default_value_t = 1_000_000)]
    objects: usize,

    /// First magic factor of a scanned range.
    #[arg(long, default_value_t = 0)]
    lo: usize,

    /// One past the last magic factor of a scanned range.
    #[arg(long, default_value_t = 0)]
    hi: usize,

    /// Comma-separated list of additional magic factors.
    #[arg(long, default_value = "")]
    factors: String,

    /// Hash function to build the rings with.
    #[arg(long, value_enum, default_value = "xx64")]
    hash: HashChoice,

    /// Number of worker threads.
    #[arg(long, default_value_t = default_parallelism())]
    parallelism: usize,

    /// Print a factor,stddev_pct,latency_ms CSV to standard output.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    csv: bool,

    /// Output tracing in json format.
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum HashChoice {
    /// xxhash64 with seed 0, the ring's default.
    Xx64,
    /// SipHash-1-3 with a zero key.
    Sip13,
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// SipHash-1-3 builder for the `--hash sip13` option.
#[derive(Debug, Clone, Copy, Default)]
struct Sip13Builder;

impl BuildHasher for Sip13Builder {
    type Hasher = SipHasher13;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher13::new()
    }
}

struct Measurement {
    factor: usize,
    stddev: f64,
    latency: Duration,
}

fn main() {
    let args = <Args as clap::Parser>::parse();

    let t = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env_lossy(),
    );
    if args.json {
        t.json().try_init()
    } else {
        t.try_init()
    }
    .expect("failed to init tracing");

    let mut factors: Vec<usize> = args
        .factors
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().expect("malformed --factors entry"))
        .chain(args.lo..args.hi)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    if factors.is_empty() {
        factors.push(0); // 0 means the crate default.
    }

    let servers = unique_strings(args.servers, |rng| {
        Ipv4Addr::from(rng.gen::<[u8; 4]>()).to_string()
    });
    let objects = unique_strings(args.objects, |rng| {
        format!("{:016x}", rng.gen::<u64>())
    });
    tracing::info!(
        servers = servers.len(),
        objects = objects.len(),
        factors = factors.len(),
        parallelism = args.parallelism,
        hash = ?args.hash,
        "workload ready"
    );

    let results = match args.hash {
        HashChoice::Xx64 => measure(&args, &factors, &servers, &objects, DefaultHashBuilder),
        HashChoice::Sip13 => measure(&args, &factors, &servers, &objects, Sip13Builder),
    };

    if args.csv {
        println!("factor,stddev_pct,latency_ms");
        for (factor, m) in results {
            println!(
                "{},{:.4},{:.2}",
                factor,
                m.stddev / args.objects as f64 * 100.0,
                m.latency.as_secs_f64() * 1000.0,
            );
        }
    }
}

fn unique_strings(n: usize, mut gen: impl FnMut(&mut rand::rngs::ThreadRng) -> String) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut seen = HashSet::with_capacity(n);
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let s = gen(&mut rng);
        if seen.insert(s.clone()) {
            out.push(s);
        } else {
            tracing::debug!(duplicate = %s, "regenerating duplicate");
        }
    }
    out
}

fn measure<S>(
    args: &Args,
    factors: &[usize],
    servers: &[String],
    objects: &[String],
    hasher: S,
) -> BTreeMap<usize, Measurement>
where
    S: BuildHasher + Clone + Send + Sync,
{
    let mean = objects.len() as f64 / servers.len() as f64;
    let work = Mutex::new(factors.to_vec());
    let (tx, rx) = mpsc::channel::<Measurement>();

    std::thread::scope(|scope| {
        for _ in 0..args.parallelism.max(1) {
            let tx = tx.clone();
            let work = &work;
            let hasher = hasher.clone();
            scope.spawn(move || loop {
                let factor = match work.lock().unwrap().pop() {
                    Some(factor) => factor,
                    None => break,
                };

                let ring: Ring<String, S> = Ring::with_config(factor, hasher.clone());
                let start = Instant::now();
                for server in servers {
                    ring.insert(server.clone(), 1.0)
                        .expect("server items are unique");
                }
                let latency = start.elapsed();

                let mut counts: HashMap<String, usize> =
                    HashMap::with_capacity(servers.len());
                for object in objects {
                    let owner = ring
                        .get(object.as_str())
                        .expect("ring is not empty");
                    *counts.entry(owner.as_ref().clone()).or_default() += 1;
                }

                let variance = counts
                    .values()
                    .map(|&count| (count as f64 - mean).powi(2))
                    .sum::<f64>()
                    / servers.len() as f64;

                tx.send(Measurement {
                    factor,
                    stddev: variance.sqrt(),
                    latency,
                })
                .expect("main thread outlives workers");
            });
        }
        drop(tx);

        let total = factors.len();
        let mut results = BTreeMap::new();
        for m in rx {
            tracing::info!(
                factor = m.factor,
                stddev = m.stddev,
                latency_ms = m.latency.as_secs_f64() * 1000.0,
                done = results.len() + 1,
                total,
                "measured"
            );
            results.insert(m.factor, m);
        }
        results
    })
}
