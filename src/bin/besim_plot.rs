use anyhow::Context;
use besim_plot::panels::{analysis_window, weekly_overview, REFERENCE_YEAR};
use besim_plot::plot::parse_cli;
use besim_plot::TimeTable;

fn main() -> anyhow::Result<()> {
    let (prtin, figout) = parse_cli();
    println!(
        "read data from {} and plot to {}",
        prtin.display(),
        figout.display()
    );
    let table = TimeTable::from_prt(&prtin, REFERENCE_YEAR)?;
    let window = analysis_window(REFERENCE_YEAR);
    let week = table.between(window.0, window.1);
    let panels = weekly_overview()?;
    week.plot_panels(&panels, window, &figout)
        .with_context(|| format!("plotting {}", figout.display()))?;
    Ok(())
}
