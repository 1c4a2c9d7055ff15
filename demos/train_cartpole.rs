//! Train TRPO on CartPole-v1
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_cartpole --release
//! # with a JSON agent config
//! cargo run --example train_cartpole --release -- configs/cartpole.json
//! ```

use anyhow::Result;
use trpo_rl::prelude::*;

const NUM_ITERATIONS: usize = 100;
const EVAL_INTERVAL: usize = 10;
const SOLVED_REWARD: f64 = 475.0;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::load_json(path)?,
        None => AgentConfig::new("CartPole-v1").num_workers(4).min_batch_size(2048),
    };

    tracing::info!("🚀 Starting CartPole TRPO Training");
    tracing::info!("  Workers: {}", config.num_workers);
    tracing::info!("  Batch size: {}", config.min_batch_size);
    tracing::info!("  Max KL: {}", config.trpo.max_kl);

    let mut agent = TrpoAgent::from_config(config)?;
    let mut sink = TracingSink;

    for iteration in 0..NUM_ITERATIONS {
        let stats = agent.learn(iteration, &mut sink)?;

        if iteration % EVAL_INTERVAL == 0 {
            let eval_reward = agent.evaluate(iteration)?;
            if eval_reward >= SOLVED_REWARD && stats.collect.avg_reward >= SOLVED_REWARD {
                tracing::info!("✅ Solved at iteration {}", iteration);
                break;
            }
        }
    }

    let path = agent.save("trained_models")?;
    tracing::info!("💾 Saved checkpoint to {}", path.display());

    agent.close();
    Ok(())
}
