//! Runs with the same seed are reproducible
//!
//! Network initialization draws from libtorch's global generator, so this
//! check lives in its own test binary where nothing else touches it.

use trpo_rl::{
    policy::StochasticPolicy,
    train::{AgentConfig, TrpoAgent},
    utils::NullSink,
};

#[test]
fn test_same_seed_same_first_iteration() {
    let run = || {
        let config = AgentConfig::new("CartPole-v1")
            .min_batch_size(128)
            .num_workers(2)
            .seed(7)
            .hidden_sizes(vec![16]);
        let mut agent = TrpoAgent::from_config(config).unwrap();
        let stats = agent.learn(0, &mut NullSink).unwrap();
        (
            stats.collect.num_steps,
            stats.collect.total_reward,
            agent.policy().flat_params().unwrap(),
            agent.filter().clone(),
        )
    };
    assert_eq!(run(), run());
}
