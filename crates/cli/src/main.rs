mod apps;
mod arguments;
mod deploy;
mod manifest;
mod project;
mod publish;
mod run;
mod wrapper;

fn main() -> anyhow::Result<()> {
    arguments::execute()
}
