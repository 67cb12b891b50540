//! Forward Pass Demonstration
//!
//! Builds an encoder-decoder transformer from a preset or a JSON config,
//! runs one eval-mode forward pass and prints the logits shape, the greedy
//! argmax per target position and the first encoder layer's attention map.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example forward
//!
//! # Custom token ids and seed
//! cargo run --release --example forward -- --src 1,5,6,4,3,9,5,2,0 --trg 1,7,4,3,5,9,2 --seed 7
//!
//! # Load a configuration file, with debug logging
//! RUST_LOG=debug cargo run --release --example forward -- --config model.json
//! ```

use clap::Parser;
use seq2seq::{Mask, Transformer, TransformerConfig};

#[derive(Parser)]
#[command(
    name = "forward",
    about = "Run one forward pass through an encoder-decoder transformer"
)]
struct Args {
    /// Named preset: "tiny" or "default"
    #[arg(long, default_value = "tiny")]
    preset: String,

    /// JSON configuration file (overrides --preset)
    #[arg(long)]
    config: Option<String>,

    /// Seed for parameter initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Source token ids, comma separated
    #[arg(long, value_delimiter = ',', default_value = "1,5,6,4,3,9,5,2,0")]
    src: Vec<usize>,

    /// Target token ids, comma separated
    #[arg(long, value_delimiter = ',', default_value = "1,7,4,3,5,9,2")]
    trg: Vec<usize>,

    /// Padding id masked out of the source
    #[arg(long, default_value = "0")]
    pad: usize,
}

fn main() -> seq2seq::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TransformerConfig::from_json_file(path)?,
        None => match args.preset.as_str() {
            "tiny" => TransformerConfig::tiny(10, 10),
            "default" => TransformerConfig::default(),
            other => {
                eprintln!("Unknown preset '{}'. Use 'tiny' or 'default'.", other);
                std::process::exit(1);
            }
        },
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    println!("\n{}", "=".repeat(70));
    println!("  Encoder-Decoder Transformer Forward Pass");
    println!("{}", "=".repeat(70));

    println!(
        "\n{:<8} {:<8} {:<8} {:<8} {:<10} {:<10}",
        "Embed", "Heads", "Layers", "FFx", "SrcVocab", "TrgVocab"
    );
    println!("{}", "-".repeat(70));
    println!(
        "{:<8} {:<8} {:<8} {:<8} {:<10} {:<10}",
        config.embed_size,
        config.heads,
        config.num_layers,
        config.forward_expansion,
        config.src_vocab_size,
        config.trg_vocab_size
    );

    let mut model = Transformer::new(&config)?;
    model.set_training(false);

    let params = model.count_parameters();
    println!(
        "\nTotal parameters: {} ({:.2}M)",
        params,
        params as f32 / 1_000_000.0
    );

    let src = vec![args.src];
    let trg = vec![args.trg];
    let src_mask = Mask::padding(&src, args.pad)?;

    let logits = model.forward(&src, &trg, Some(&src_mask), None)?;

    println!("\n{}", "─".repeat(70));
    println!("Logits shape: {:?}", logits.shape);
    println!("{}", "─".repeat(70));

    let vocab = logits.last_dim();
    let predictions: Vec<usize> = logits
        .data
        .chunks(vocab.max(1))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect();
    println!("Greedy argmax per target position: {:?}", predictions);

    let maps = model.encoder_attention(&src, Some(&src_mask))?;
    if let Some(first) = maps.first() {
        let len = src[0].len();
        println!("\nEncoder layer 1, head 1 attention:");
        for q in 0..len {
            let row: Vec<String> = (0..len)
                .map(|k| format!("{:.2}", first.get(&[0, 0, q, k])))
                .collect();
            println!("  {}", row.join(" "));
        }
    }

    println!();
    Ok(())
}
