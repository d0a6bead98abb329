use super::VERSION;
use clap::{App, Arg};
use std::path::PathBuf;

/// Takes the CLI arguments that control the plotting of the weekly
/// overview: the simulation output file and the optional figure file.
/// A wrong argument count makes clap print the usage and exit non-zero
/// before any file is touched.
pub fn parse_cli() -> (PathBuf, PathBuf) {
    let arg_prtin = Arg::with_name("input_file")
        .help("simulation output file to plot")
        .required(true)
        .index(1);
    let arg_figout = Arg::with_name("output_file")
        .help("name of the output figure file, defaults to the input file with the extension swapped to svg")
        .index(2);
    let cli_args = App::new("besim_plot")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to plot the weekly overview of a building energy simulation")
        .arg(arg_prtin)
        .arg(arg_figout)
        .get_matches();
    let prtin = PathBuf::from(cli_args.value_of("input_file").unwrap_or_default());
    let figout = match cli_args.value_of("output_file") {
        Some(p) => PathBuf::from(p),
        None => {
            let mut figout = prtin.clone();
            figout.set_extension("svg");
            figout
        }
    };
    return (prtin, figout);
}
