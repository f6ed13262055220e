use anyhow::Result;

use crate::config::Config;
use crate::ids::SequentialIds;
use crate::models::RagSource;
use crate::store::RagRegistry;

/// Print the configured RAG sources as a table.
pub fn list_sources(config: &Config) -> Result<()> {
    let registry = RagRegistry::seeded(&config.rag_sources, &SequentialIds::new("rag"));
    print!("{}", render_table(&registry.all()));
    Ok(())
}

pub fn render_table(sources: &[RagSource]) -> String {
    let mut out = format!("{:<32} {:<8} URL\n", "SOURCE", "ACTIVE");
    for source in sources {
        out.push_str(&format!(
            "{:<32} {:<8} {}\n",
            source.name,
            if source.active { "yes" } else { "no" },
            source.url
        ));
    }
    if sources.is_empty() {
        out.push_str("(no RAG sources configured)\n");
    }
    out
}
