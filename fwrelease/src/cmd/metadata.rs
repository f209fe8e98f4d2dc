use clap::*;
use fwrelease::ctx::AppContext;

#[derive(Args, Debug)]
pub struct Cmd {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
    /// Print the header as the firmware build would generate it
    #[arg(long, conflicts_with = "json")]
    pub render: bool,
}

impl Cmd {
    pub fn run(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let prefix = ctx.config.metadata.prefix.clone();
        let path = ctx.metadata_path();
        let meta = ctx.build_metadata()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(meta)?);
        } else if self.render {
            print!("{}", meta.render(&prefix));
        } else {
            println!("file:    {}", path.display());
            println!("date:    {}", meta.date());
            println!("version: {}", meta.version());
            println!("hash:    {}", meta.hash_short());
            if let Some(name) = meta.name() {
                println!("name:    {name}");
            }
        }
        Ok(())
    }
}
