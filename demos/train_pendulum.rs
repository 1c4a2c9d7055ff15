//! Train TRPO on Pendulum-v1 (continuous actions)
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_pendulum --release
//! ```

use anyhow::Result;
use trpo_rl::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::load_json(path)?,
        None => AgentConfig::new("Pendulum-v1")
            .num_workers(4)
            .min_batch_size(5000)
            .hidden_sizes(vec![64, 64])
            .trpo(TrpoConfig::default().max_kl(1e-2).value_epochs(5)),
    };

    let mut agent = TrpoAgent::from_config(config)?;
    let mut sink = TracingSink;

    for iteration in 0..200 {
        agent.learn(iteration, &mut sink)?;
        if iteration % 20 == 0 {
            agent.evaluate(iteration)?;
        }
    }

    let path = agent.save("trained_models")?;
    tracing::info!("Saved checkpoint to {}", path.display());
    agent.close();
    Ok(())
}
