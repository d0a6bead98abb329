use crate::PlotError;
use chrono::{NaiveDate, NaiveDateTime};

/// Year the simulation hour offsets count from.
pub const REFERENCE_YEAR: i32 = 2024;

/// The week shown by the overview sheet. The simulation runs past hour
/// 8760, so the window lands in February of the following calendar year.
pub fn analysis_window(year: i32) -> (NaiveDateTime, NaiveDateTime) {
    (midnight(year + 1, 2, 7), midnight(year + 1, 2, 14))
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid calendar date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
}

/// A y-axis label plus the ordered table columns plotted against it.
/// Both parts must be non-empty, which `new` enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    label: String,
    variables: Vec<String>,
}

impl AxisSpec {
    pub fn new<S: Into<String>>(label: S, variables: &[&str]) -> Result<AxisSpec, PlotError> {
        let label = label.into();
        if label.is_empty() || variables.is_empty() {
            return Err(PlotError::EmptyAxisSpec);
        }
        Ok(AxisSpec {
            label,
            variables: variables.iter().map(|v| v.to_string()).collect(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// One row of the output grid: a left axis, an optional right axis
/// sharing the same time axis, and a legend cell fed by both.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSpec {
    pub left: AxisSpec,
    pub right: Option<AxisSpec>,
}

impl PanelSpec {
    pub fn new(left: AxisSpec, right: Option<AxisSpec>) -> PanelSpec {
        PanelSpec { left, right }
    }

    /// left axis first, then the right axis when present
    pub fn axes(&self) -> impl Iterator<Item = &AxisSpec> {
        std::iter::once(&self.left).chain(self.right.iter())
    }
}

/// The five fixed panels of the weekly overview sheet: ambient and inside
/// temperatures, the electric power breakdown, domestic hot water, space
/// heating, and the heat pump statuses with their duty-cycle rate.
pub fn weekly_overview() -> Result<Vec<PanelSpec>, PlotError> {
    Ok(vec![
        PanelSpec::new(
            AxisSpec::new("Ambient temperature [°C]", &["Tamb24"])?,
            Some(AxisSpec::new(
                "Inside temperatures [°C]",
                &[
                    "Top_EG_Ost",
                    "Top_EG_West",
                    "Top_1OG_Ost",
                    "Top_1OG_West",
                    "Top_2OG_Ost",
                    "Top_2OG_West",
                ],
            )?),
        ),
        PanelSpec::new(
            AxisSpec::new(
                "Power [kW]",
                &[
                    "PelPVAC_kW",
                    "myPelBui_kW",
                    "PelAuxComp_kW",
                    "PVToBui_kW",
                    "PVToHP_kW",
                    "PvToGrid_kW",
                    "PelFromGrid_kW",
                ],
            )?,
            None,
        ),
        PanelSpec::new(
            AxisSpec::new(
                "Temperatures [°C]",
                &["TTesDhwAuxOn", "TTesDhwAuxOff", "Tdhw"],
            )?,
            Some(AxisSpec::new("Power [kW]", &["Pdhw_kW"])?),
        ),
        PanelSpec::new(
            AxisSpec::new(
                "Temperatures [°C]",
                &["TsensorTesSh", "TRdSet", "tSet_MixSh", "tRoomSet", "Tin_BuiRd"],
            )?,
            Some(AxisSpec::new("Power [kW]", &["qSysOut_BuiDemand"])?),
        ),
        PanelSpec::new(
            AxisSpec::new("Statuses [-]", &["BoHS", "HpForDHWIsNeeded", "HpForSHIsNeeded"])?,
            Some(AxisSpec::new("Rate [%]", &["pwrRate"])?),
        ),
    ])
}
