//! Generate a reproducible snapshot and RC line for validation testing

use rand::rngs::StdRng;
use rand::SeedableRng;
use synheart_drive::rc::RcCommand;
use synheart_drive::{simulate_cycle, PipelineConfig};

fn main() {
    let config = PipelineConfig::default().with_seed(2024);
    let mut rng = StdRng::seed_from_u64(2024);

    // 2024-01-15T14:00:00Z
    match simulate_cycle(&config, 1_705_327_200_000, &mut rng) {
        Ok(snapshot) => {
            match snapshot.to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: {e:?}"),
            }
            eprintln!("{}", RcCommand::from_vector(&snapshot.vector).encode());
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
