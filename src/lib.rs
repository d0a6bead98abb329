use chrono::prelude::*;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
pub mod panels;
pub mod plot;

use crate::panels::PanelSpec;

pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// Header of the hour-offset column in the simulation output.
pub const TIME_COLUMN: &str = "TIME";

/// A4 portrait, 8.27 x 11.69 in at 100 px per inch.
pub const PAGE_SIZE: (u32, u32) = (827, 1169);

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("cannot read {}: {}", path.display(), source)]
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("format error: {0}")]
    Format(String),
    #[error("column {0} not found in table")]
    MissingColumn(String),
    #[error("axis label and variables cannot be empty")]
    EmptyAxisSpec,
    #[error("rendering failed: {0}")]
    Render(String),
}

/// The main struct for the simulation time series:
/// a datetime index plus the named numeric columns.
#[derive(Debug, Clone)]
pub struct TimeTable {
    pub time: Vec<NaiveDateTime>,
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl TimeTable {
    pub fn new(names: Vec<String>) -> TimeTable {
        let columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        TimeTable {
            time: Vec::new(),
            names,
            columns,
        }
    }

    /// Init a TimeTable from a whitespace-delimited simulation output file.
    ///
    /// The first line holds the column headers; the `TIME` column is read as
    /// hours since January 1 of `year`, becomes the datetime index and is
    /// dropped from the table. Data cells that do not parse as numbers are
    /// set to NAN, a non-numeric `TIME` cell is fatal.
    pub fn from_prt(fin: &Path, year: i32) -> Result<TimeTable, PlotError> {
        let file = File::open(fin).map_err(|e| PlotError::FileAccess {
            path: fin.to_path_buf(),
            source: e,
        })?;
        let buf = BufReader::new(file);
        let mut lines = buf.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((_, l)) => {
                    let l = l.map_err(|e| PlotError::FileAccess {
                        path: fin.to_path_buf(),
                        source: e,
                    })?;
                    if !l.trim().is_empty() {
                        break l;
                    }
                }
                None => return Err(PlotError::Format("no header line".to_string())),
            }
        };
        let headers: Vec<String> = header.split_whitespace().map(str::to_string).collect();
        let time_idx = headers
            .iter()
            .position(|h| h == TIME_COLUMN)
            .ok_or_else(|| PlotError::Format(format!("no {} column in header", TIME_COLUMN)))?;
        let names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != time_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut table = TimeTable::new(names);
        let start = year_start(year);
        for (n, l) in lines {
            let l = l.map_err(|e| PlotError::FileAccess {
                path: fin.to_path_buf(),
                source: e,
            })?;
            if l.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = l.split_whitespace().collect();
            if fields.len() != headers.len() {
                return Err(PlotError::Format(format!(
                    "line {}: expected {} fields, found {}",
                    n + 1,
                    headers.len(),
                    fields.len()
                )));
            }
            let hours: f64 = fields[time_idx].parse().map_err(|_| {
                PlotError::Format(format!(
                    "line {}: {} value {:?} is not numeric",
                    n + 1,
                    TIME_COLUMN,
                    fields[time_idx]
                ))
            })?;
            table.time.push(start + hours_to_duration(hours));
            let mut col = 0;
            for (i, field) in fields.iter().enumerate() {
                if i == time_idx {
                    continue;
                }
                let value: f64 = match field.parse() {
                    Ok(v) => v,
                    Err(_) => {
                        println!(
                            "invalid value {:?} for {} on line {}",
                            field,
                            table.names[col],
                            n + 1
                        );
                        f64::NAN
                    }
                };
                table.columns[col].push(value);
                col += 1;
            }
        }
        Ok(table)
    }

    /// keeps the rows whose timestamp falls in [begin, end], both ends
    /// included; a window with no matching rows gives an empty table
    pub fn between(&self, begin: NaiveDateTime, end: NaiveDateTime) -> TimeTable {
        let mut table = TimeTable::new(self.names.clone());
        for (i, &t) in self.time.iter().enumerate() {
            if begin <= t && t <= end {
                table.time.push(t);
                for (col, values) in table.columns.iter_mut().zip(self.columns.iter()) {
                    col.push(values[i]);
                }
            }
        }
        table
    }

    pub fn column(&self, name: &str) -> Result<&[f64], PlotError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| PlotError::MissingColumn(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// plots the panels to the given path, one grid row per panel with the
    /// combined legend in a narrow side cell; the backend is picked from
    /// the output extension (svg, or png/bmp/jpeg/jpg for bitmaps)
    ///
    /// All the panel variables are checked against the table before the
    /// backend is created, so a missing column never leaves an output file.
    pub fn plot_panels(
        &self,
        panels: &[PanelSpec],
        window: (NaiveDateTime, NaiveDateTime),
        fout: &Path,
    ) -> Result<(), PlotError> {
        for panel in panels {
            for axis in panel.axes() {
                for var in axis.variables() {
                    self.column(var)?;
                }
            }
        }
        let ext = fout.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "svg" => {
                let root = SVGBackend::new(fout, PAGE_SIZE).into_drawing_area();
                self.render_panels(&root, panels, window)?;
                root.present().map_err(render_err)?;
            }
            "png" | "bmp" | "jpeg" | "jpg" => {
                let root = BitMapBackend::new(fout, PAGE_SIZE).into_drawing_area();
                self.render_panels(&root, panels, window)?;
                root.present().map_err(render_err)?;
            }
            other => {
                return Err(PlotError::Format(format!(
                    "unsupported output format {:?}",
                    other
                )));
            }
        }
        Ok(())
    }

    fn render_panels<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        panels: &[PanelSpec],
        window: (NaiveDateTime, NaiveDateTime),
    ) -> Result<(), PlotError> {
        root.fill(&WHITE).map_err(render_err)?;
        let rows = root.split_evenly((panels.len(), 1));
        for (panel, row) in panels.iter().zip(rows.iter()) {
            // plot cell : legend cell = 5 : 1
            let (width, _) = row.dim_in_pixel();
            let (plot_area, legend_area) = row.split_horizontally(width as i32 * 5 / 6);
            self.render_panel(panel, &plot_area, &legend_area, window)?;
        }
        Ok(())
    }

    fn render_panel<DB: DrawingBackend>(
        &self,
        panel: &PanelSpec,
        plot_area: &DrawingArea<DB, Shift>,
        legend_area: &DrawingArea<DB, Shift>,
        window: (NaiveDateTime, NaiveDateTime),
    ) -> Result<(), PlotError> {
        let (begin, end) = window;
        let xmin = TimeZone::from_utc_datetime(&Utc, &begin);
        let xmax = TimeZone::from_utc_datetime(&Utc, &end);
        let xfmt = suitable_xfmt(end - begin);
        let left_range = self.axis_range(panel.left.variables())?;
        let right_range = match &panel.right {
            Some(axis) => self.axis_range(axis.variables())?,
            None => left_range.clone(),
        };

        let mut builder = ChartBuilder::on(plot_area);
        builder
            .margin(6)
            .x_label_area_size(22)
            .y_label_area_size(50);
        if panel.right.is_some() {
            builder.right_y_label_area_size(50);
        }
        let mut chart = builder
            .build_cartesian_2d(xmin..xmax, left_range)
            .map_err(render_err)?
            .set_secondary_coord(xmin..xmax, right_range);

        chart
            .configure_mesh()
            .light_line_style(&TRANSPARENT)
            .x_labels(8)
            .y_labels(5)
            .label_style(("sans-serif", 11))
            .x_label_formatter(&|x: &DateTime<Utc>| x.format(xfmt).to_string())
            .y_desc(panel.left.label())
            .draw()
            .map_err(render_err)?;
        if let Some(axis) = &panel.right {
            chart
                .configure_secondary_axes()
                .label_style(("sans-serif", 11))
                .y_desc(axis.label())
                .draw()
                .map_err(render_err)?;
        }

        // one palette for the whole panel, left series first, so the right
        // axis continues the color sequence instead of restarting it
        let mut entries: Vec<(String, RGBAColor)> = Vec::new();
        for var in panel.left.variables() {
            let color = Palette99::pick(entries.len()).to_rgba();
            for segment in self.segments(var, begin, end)? {
                chart
                    .draw_series(LineSeries::new(segment, color.stroke_width(1)))
                    .map_err(render_err)?;
            }
            entries.push((var.clone(), color));
        }
        if let Some(axis) = &panel.right {
            for var in axis.variables() {
                let color = Palette99::pick(entries.len()).to_rgba();
                for segment in self.segments(var, begin, end)? {
                    chart
                        .draw_secondary_series(LineSeries::new(segment, color.stroke_width(1)))
                        .map_err(render_err)?;
                }
                entries.push((var.clone(), color));
            }
        }
        draw_legend(legend_area, &entries)
    }

    /// y range covering the finite values of the axis variables, padded by
    /// a tenth of the span on each side; falls back to a fixed pad when the
    /// span degenerates and to 0..1 when there is no data at all
    fn axis_range(&self, variables: &[String]) -> Result<std::ops::Range<f64>, PlotError> {
        let mut bounds: Option<(f64, f64)> = None;
        for var in variables {
            for &v in self.column(var)? {
                if v.is_nan() {
                    continue;
                }
                bounds = match bounds {
                    None => Some((v, v)),
                    Some((min, max)) => Some((min.min(v), max.max(v))),
                };
            }
        }
        let (ymin, ymax) = match bounds {
            Some(b) => b,
            None => return Ok(0.0..1.0),
        };
        let yspan = ymax - ymin;
        let ymargin = if yspan < 1e-6 { 0.5 } else { yspan / 10. };
        Ok((ymin - ymargin)..(ymax + ymargin))
    }

    /// contiguous non-NAN runs of a column inside the window; NAN cells
    /// split the line into separate segments, leaving a gap
    fn segments(
        &self,
        name: &str,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Vec<(DateTime<Utc>, f64)>>, PlotError> {
        let values = self.column(name)?;
        let mut segments: Vec<Vec<(DateTime<Utc>, f64)>> = Vec::new();
        let mut current: Vec<(DateTime<Utc>, f64)> = Vec::new();
        for (&t, &v) in self.time.iter().zip(values.iter()) {
            if t < begin || end < t {
                continue;
            }
            if v.is_nan() {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            } else {
                current.push((TimeZone::from_utc_datetime(&Utc, &t), v));
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        Ok(segments)
    }
}

/// draws the combined legend entries into the side cell, a color swatch
/// plus the variable name each; the cell carries no axes or frame
fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entries: &[(String, RGBAColor)],
) -> Result<(), PlotError> {
    let font = ("sans-serif", 11).into_font();
    for (i, (name, color)) in entries.iter().enumerate() {
        let y = 14 + i as i32 * 15;
        area.draw(&PathElement::new(
            vec![(4, y), (20, y)],
            color.stroke_width(2),
        ))
        .map_err(render_err)?;
        area.draw(&Text::new(name.clone(), (24, y - 6), font.clone()))
            .map_err(render_err)?;
    }
    Ok(())
}

fn render_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> PlotError {
    PlotError::Render(e.to_string())
}

fn year_start(year: i32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .expect("january 1 is a valid date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
}

fn hours_to_duration(hours: f64) -> chrono::Duration {
    chrono::Duration::seconds((hours * 3600.).round() as i64)
}

pub fn suitable_xfmt(d: chrono::Duration) -> &'static str {
    let xfmt = if d > chrono::Duration::weeks(1) {
        "%y-%m-%d"
    } else if d > chrono::Duration::days(1) {
        "%m-%d %H"
    } else {
        "%d %H:%M"
    };
    return xfmt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panels::AxisSpec;
    use std::io::Write;

    fn write_fixture(name: &str, content: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("besim_plot_{}_{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    const SMALL_PRT: &str = "TIME Tamb24 Pdhw_kW\n\
                             1 -3.5 0.0\n\
                             2 -3.0 1.25\n\
                             3.5 -2.5 0.5\n";

    #[test]
    fn index_from_time_offsets() {
        let path = write_fixture("index.prt", SMALL_PRT);
        let table = TimeTable::from_prt(&path, 2024).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(table.names, vec!["Tamb24", "Pdhw_kW"]);
        assert_eq!(
            table.time,
            vec![
                dt(2024, 1, 1, 1, 0),
                dt(2024, 1, 1, 2, 0),
                dt(2024, 1, 1, 3, 30),
            ]
        );
        assert!(table.time.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.column("Tamb24").unwrap(), &[-3.5, -3.0, -2.5]);
        assert_eq!(table.column("Pdhw_kW").unwrap(), &[0.0, 1.25, 0.5]);
    }

    #[test]
    fn missing_file_is_access_error() {
        let path = PathBuf::from("no_such_dir/no_such_file.prt");
        let err = TimeTable::from_prt(&path, 2024).unwrap_err();
        assert!(matches!(err, PlotError::FileAccess { .. }));
    }

    #[test]
    fn missing_time_column_is_format_error() {
        let path = write_fixture("notime.prt", "Tamb24 Pdhw_kW\n1.0 2.0\n");
        let err = TimeTable::from_prt(&path, 2024).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, PlotError::Format(_)));
    }

    #[test]
    fn non_numeric_time_is_format_error() {
        let path = write_fixture("badtime.prt", "TIME Tamb24\nnoon -3.5\n");
        let err = TimeTable::from_prt(&path, 2024).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, PlotError::Format(_)));
    }

    #[test]
    fn ragged_row_is_format_error() {
        let path = write_fixture("ragged.prt", "TIME Tamb24 Pdhw_kW\n1 -3.5\n");
        let err = TimeTable::from_prt(&path, 2024).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, PlotError::Format(_)));
    }

    #[test]
    fn invalid_data_cell_becomes_nan() {
        let path = write_fixture("nan.prt", "TIME Tamb24\n1 -3.5\n2 ****\n3 -2.5\n");
        let table = TimeTable::from_prt(&path, 2024).unwrap();
        std::fs::remove_file(&path).unwrap();
        let values = table.column("Tamb24").unwrap();
        assert_eq!(values.len(), 3);
        assert!(values[1].is_nan());
        let segments = table
            .segments("Tamb24", dt(2024, 1, 1, 0, 0), dt(2024, 1, 2, 0, 0))
            .unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn empty_input_is_format_error() {
        let path = write_fixture("empty.prt", "");
        let err = TimeTable::from_prt(&path, 2024).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, PlotError::Format(_)));
    }

    #[test]
    fn between_is_inclusive_and_idempotent() {
        let path = write_fixture("between.prt", SMALL_PRT);
        let table = TimeTable::from_prt(&path, 2024).unwrap();
        std::fs::remove_file(&path).unwrap();
        let begin = dt(2024, 1, 1, 1, 0);
        let end = dt(2024, 1, 1, 2, 0);
        let filtered = table.between(begin, end);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.time, vec![begin, end]);
        let twice = filtered.between(begin, end);
        assert_eq!(twice.time, filtered.time);
        assert_eq!(twice.columns, filtered.columns);
    }

    #[test]
    fn between_without_matches_is_empty_table() {
        let path = write_fixture("nomatch.prt", SMALL_PRT);
        let table = TimeTable::from_prt(&path, 2024).unwrap();
        std::fs::remove_file(&path).unwrap();
        let filtered = table.between(dt(2025, 2, 7, 0, 0), dt(2025, 2, 14, 0, 0));
        assert!(filtered.is_empty());
        assert_eq!(filtered.names, table.names);
    }

    #[test]
    fn unknown_column_is_missing_column_error() {
        let table = TimeTable::new(vec!["Tamb24".to_string()]);
        let err = table.column("Tdhw").unwrap_err();
        assert!(matches!(err, PlotError::MissingColumn(name) if name == "Tdhw"));
    }

    #[test]
    fn axis_range_pads_span_and_handles_degenerate_data() {
        let mut table = TimeTable::new(vec!["a".to_string(), "b".to_string()]);
        table.time = vec![dt(2024, 1, 1, 0, 0), dt(2024, 1, 1, 1, 0)];
        table.columns = vec![vec![0.0, 10.0], vec![5.0, 5.0]];
        let range = table.axis_range(&["a".to_string()]).unwrap();
        assert_eq!(range, -1.0..11.0);
        let flat = table.axis_range(&["b".to_string()]).unwrap();
        assert_eq!(flat, 4.5..5.5);
        let empty = TimeTable::new(vec!["a".to_string()]);
        assert_eq!(empty.axis_range(&["a".to_string()]).unwrap(), 0.0..1.0);
    }

    #[test]
    fn unsupported_output_format_is_rejected() {
        let table = TimeTable::new(vec!["Tamb24".to_string()]);
        let panels = vec![PanelSpec::new(
            AxisSpec::new("Ambient temperature [°C]", &["Tamb24"]).unwrap(),
            None,
        )];
        let window = (dt(2025, 2, 7, 0, 0), dt(2025, 2, 14, 0, 0));
        let out = std::env::temp_dir().join("besim_plot_bad_ext.docx");
        let err = table.plot_panels(&panels, window, &out).unwrap_err();
        assert!(matches!(err, PlotError::Format(_)));
        assert!(!out.exists());
    }

    #[test]
    fn suitable_xfmt_picks_span_format() {
        assert_eq!(suitable_xfmt(chrono::Duration::weeks(2)), "%y-%m-%d");
        assert_eq!(suitable_xfmt(chrono::Duration::days(7)), "%m-%d %H");
        assert_eq!(suitable_xfmt(chrono::Duration::hours(12)), "%d %H:%M");
    }
}
