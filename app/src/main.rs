fn main() -> anyhow::Result<()> {
    bowtie_lib::run()
}
