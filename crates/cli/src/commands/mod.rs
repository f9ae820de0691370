mod run;

pub use run::{RunArgs, cmd_run};

use acervo_core::SourceId;

/// Print the available sources and what each one can discover.
pub fn cmd_sources() {
  println!("available sources:");
  for source in SourceId::all() {
    let modes = match source {
      SourceId::Dof => "--today | --date | --from/--to",
      SourceId::Scjn => "--category [--scope --status] | --query",
      SourceId::Bjv => "--query",
      SourceId::Cas => "--query [--filter k=v] | --category",
    };
    println!("  {:<5} {}", source.as_str(), modes);
  }
}
