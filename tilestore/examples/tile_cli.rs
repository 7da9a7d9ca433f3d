#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use tilestore::{
    BigMatrix, DenseMatrix, FsStore, MatrixConfig, SymmetricMatrix, TiledMatrix,
};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "Tilestore CLI - create, fill and query tiled matrices in a local bucket")]
struct Cli {
    /// Directory holding bucket directories
    #[arg(long, default_value = "./tilestore-data")]
    root: PathBuf,

    /// Bucket name (falls back to TILESTORE_BUCKET)
    #[arg(long)]
    bucket: Option<String>,

    /// Key prefix for matrix objects
    #[arg(long, default_value = tilestore::config::DEFAULT_PREFIX)]
    prefix: String,

    /// Treat the matrix as symmetric
    #[arg(long)]
    symmetric: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Create a matrix and write its header
    Create {
        key: String,
        #[arg(long)]
        rows: usize,
        #[arg(long)]
        cols: usize,
        #[arg(long)]
        tile_rows: usize,
        #[arg(long)]
        tile_cols: usize,
        #[arg(long, default_value_t = 1)]
        replication: usize,
    },
    /// Show shape, tiling and block counts
    Info { key: String },
    /// Fill every block with uniform random values
    ShardRandom {
        key: String,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 4)]
        threads: usize,
    },
    /// Print one element
    Get {
        key: String,
        row: usize,
        col: usize,
    },
    /// Print one row
    Row { key: String, row: usize },
    /// List existing and missing blocks
    Exists { key: String },
    /// Delete every block and the header
    Free { key: String },
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    match &cli.command {
        Commands::Create {
            key,
            rows,
            cols,
            tile_rows,
            tile_cols,
            replication,
        } => {
            let config = base_config(&cli, key)?
                .with_shape(*rows, *cols)
                .with_tile_shape(*tile_rows, *tile_cols)
                .with_replication_factor(*replication);
            let store = open_store(&cli, &config)?;
            if cli.symmetric {
                let matrix = SymmetricMatrix::open(store, config)?;
                print_info(&matrix, matrix.existing_block_idxs()?.len());
            } else {
                let matrix = BigMatrix::open(store, config)?;
                print_info(&matrix, matrix.existing_block_idxs()?.len());
            }
        }
        Commands::Info { key } => {
            let config = base_config(&cli, key)?;
            let store = open_store(&cli, &config)?;
            if cli.symmetric {
                let matrix = SymmetricMatrix::open(store, config)?;
                print_info(&matrix, matrix.existing_block_idxs()?.len());
            } else {
                let matrix = BigMatrix::open(store, config)?;
                print_info(&matrix, matrix.existing_block_idxs()?.len());
            }
        }
        Commands::ShardRandom { key, seed, threads } => {
            let config = base_config(&cli, key)?.with_shard_parallelism(*threads);
            let store = open_store(&cli, &config)?;
            if cli.symmetric {
                let matrix = SymmetricMatrix::open(store, config)?;
                let full = random_dense(matrix.shape(), *seed, true);
                matrix.shard_matrix(&full, None)?;
            } else {
                let matrix = BigMatrix::open(store, config)?;
                let full = random_dense(matrix.shape(), *seed, false);
                matrix.shard_matrix(&full, None)?;
            }
        }
        Commands::Get { key, row, col } => {
            let value: f64 = with_matrix(&cli, key, |m| m.element(*row, *col))?;
            println!("[{row}, {col}] = {value}");
        }
        Commands::Row { key, row } => {
            let values: Vec<f64> = with_matrix(&cli, key, |m| m.row(*row))?;
            println!("row {row}: {values:?}");
        }
        Commands::Exists { key } => {
            let config = base_config(&cli, key)?;
            let store = open_store(&cli, &config)?;
            let (existing, missing) = if cli.symmetric {
                let matrix = SymmetricMatrix::open(store, config)?;
                (matrix.existing_block_idxs()?, matrix.missing_block_idxs()?)
            } else {
                let matrix = BigMatrix::open(store, config)?;
                (matrix.existing_block_idxs()?, matrix.missing_block_idxs()?)
            };
            println!("existing ({}): {existing:?}", existing.len());
            println!("missing ({}): {missing:?}", missing.len());
        }
        Commands::Free { key } => {
            let config = base_config(&cli, key)?;
            let store = open_store(&cli, &config)?;
            if cli.symmetric {
                SymmetricMatrix::open(store, config)?.free()?;
            } else {
                BigMatrix::open(store, config)?.free()?;
            }
            println!("freed {key}");
        }
    }

    println!("Completed in {:.2?}", start_time.elapsed());
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("This example requires the 'cli' feature to be enabled.");
    eprintln!("Run with: cargo run --features cli --example tile_cli");
    std::process::exit(1);
}

#[cfg(feature = "cli")]
fn base_config(cli: &Cli, key: &str) -> tilestore::Result<MatrixConfig> {
    let mut config = MatrixConfig::new(key).with_prefix(cli.prefix.clone());
    if let Some(bucket) = &cli.bucket {
        config = config.with_bucket(bucket.clone());
    }
    config.resolve_bucket(|name| std::env::var(name).ok())
}

#[cfg(feature = "cli")]
fn open_store(cli: &Cli, config: &MatrixConfig) -> tilestore::Result<FsStore> {
    let bucket = config.bucket.as_deref().unwrap_or_default();
    Ok(FsStore::for_bucket(&cli.root, bucket)?)
}

#[cfg(feature = "cli")]
fn with_matrix<R>(
    cli: &Cli,
    key: &str,
    read: impl Fn(&dyn ReadMatrix) -> tilestore::Result<R>,
) -> tilestore::Result<R> {
    let config = base_config(cli, key)?;
    let store = open_store(cli, &config)?;
    if cli.symmetric {
        read(&SymmetricMatrix::open(store, config)?)
    } else {
        read(&BigMatrix::open(store, config)?)
    }
}

/// Object-safe slice of `TiledMatrix` used by the read commands
#[cfg(feature = "cli")]
trait ReadMatrix {
    fn element(&self, i: usize, j: usize) -> tilestore::Result<f64>;
    fn row(&self, i: usize) -> tilestore::Result<Vec<f64>>;
}

#[cfg(feature = "cli")]
impl<M: TiledMatrix> ReadMatrix for M {
    fn element(&self, i: usize, j: usize) -> tilestore::Result<f64> {
        TiledMatrix::element(self, i, j)
    }

    fn row(&self, i: usize) -> tilestore::Result<Vec<f64>> {
        TiledMatrix::row(self, i)
    }
}

#[cfg(feature = "cli")]
fn print_info<M: TiledMatrix>(matrix: &M, existing: usize) {
    let config = matrix.config();
    println!("Matrix Info:");
    println!("  Key: {}{}", config.prefix, config.key);
    println!("  Shape: {:?}", matrix.shape());
    println!("  Tile shape: {:?}", matrix.tile_shape());
    println!("  Tile grid: {:?}", matrix.tile_grid());
    println!("  Replication: {}", config.replication_factor);
    println!(
        "  Blocks: {existing} of {} stored",
        matrix.block_idxs().len()
    );
}

#[cfg(feature = "cli")]
fn random_dense(shape: (usize, usize), seed: u64, symmetric: bool) -> DenseMatrix<f64> {
    use rand::{Rng, SeedableRng};

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let random = DenseMatrix::from_fn(shape.0, shape.1, |_, _| rng.gen::<f64>());
    if symmetric {
        let transposed = random.transpose();
        DenseMatrix::from_fn(shape.0, shape.1, |i, j| {
            if i >= j {
                random.get(i, j).unwrap_or_default()
            } else {
                transposed.get(i, j).unwrap_or_default()
            }
        })
    } else {
        random
    }
}
