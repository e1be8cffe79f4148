use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};
use egui_extras::{Column, DatePickerButton, TableBuilder};

use aqi_forecast::data::model::CITY_COLUMN;

use crate::color::{category_color, correlation_color};
use crate::state::{AppState, PREVIEW_ROWS, TOP_CITIES};
use crate::ui::plot;

fn no_dataset(ui: &mut Ui) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading("Open a dataset to begin  (File → Open…)");
    });
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

pub fn overview(ui: &mut Ui, state: &AppState) {
    let Some(dataset) = &state.dataset else {
        no_dataset(ui);
        return;
    };
    let tables = &state.overview;

    ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        ui.heading("Dataset overview");
        ui.label(format!(
            "{} rows × {} columns",
            dataset.len(),
            dataset.columns().len()
        ));
        if let Some((first, last)) = tables.date_range {
            ui.label(format!("Dates from {first} to {last}"));
        }
        ui.add_space(8.0);

        ui.strong("Preview");
        let n_rows = dataset.len().min(PREVIEW_ROWS);
        ui.push_id("preview", |ui: &mut Ui| {
            ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
                TableBuilder::new(ui)
                    .striped(true)
                    .vscroll(false)
                    .columns(Column::auto().at_least(60.0), dataset.columns().len())
                    .header(20.0, |mut header| {
                        for col in dataset.columns() {
                            header.col(|ui: &mut Ui| {
                                ui.strong(&col.name);
                            });
                        }
                    })
                    .body(|body| {
                        body.rows(18.0, n_rows, |mut row| {
                            let r = row.index();
                            for c in 0..dataset.columns().len() {
                                row.col(|ui: &mut Ui| {
                                    ui.label(dataset.value(r, c).to_string());
                                });
                            }
                        });
                    });
            });
        });
        ui.add_space(8.0);

        ui.strong("Columns");
        egui::Grid::new("column_overview")
            .striped(true)
            .show(ui, |ui: &mut Ui| {
                ui.strong("Column");
                ui.strong("Type");
                ui.strong("Missing");
                ui.strong("Missing %");
                ui.end_row();
                for col in &tables.columns {
                    ui.label(&col.name);
                    ui.label(col.dtype.to_string());
                    ui.label(col.missing.to_string());
                    ui.label(format!("{:.1}", col.missing_pct));
                    ui.end_row();
                }
            });
        ui.add_space(8.0);

        ui.strong("Summary statistics");
        egui::Grid::new("describe")
            .striped(true)
            .show(ui, |ui: &mut Ui| {
                for head in ["", "count", "mean", "std", "min", "25%", "50%", "75%", "max"] {
                    ui.strong(head);
                }
                ui.end_row();
                for s in &tables.describe {
                    ui.label(&s.column);
                    ui.label(s.count.to_string());
                    for v in [s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max] {
                        ui.label(format!("{v:.2}"));
                    }
                    ui.end_row();
                }
            });
    });
}

// ---------------------------------------------------------------------------
// Exploration
// ---------------------------------------------------------------------------

pub fn exploration(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        no_dataset(ui);
        return;
    }
    let tables = &state.exploration;

    ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        ui.heading("Exploration");
        ui.label(format!("{} rows after filters", state.visible_indices.len()));
        ui.add_space(8.0);

        ui.strong("AQI over time");
        plot::aqi_trend(ui, &tables.aqi_trend);
        ui.strong("Average AQI by month");
        plot::monthly_line(ui, &tables.monthly_aqi);
        ui.strong("Average AQI by year");
        plot::yearly_bars(ui, &tables.yearly_aqi);
        ui.strong(format!("Top {TOP_CITIES} cities by median AQI"));
        plot::top_cities(ui, &tables.top_cities);
        ui.strong(format!("AQI distribution of the {TOP_CITIES} most recorded cities"));
        plot::city_boxes(ui, &tables.city_distributions);
        ui.add_space(8.0);

        ui.strong("Pollutant correlation");
        let Some(corr) = &tables.correlation else {
            ui.label("No numeric pollutant columns.");
            return;
        };
        egui::Grid::new("correlation")
            .spacing([2.0, 2.0])
            .show(ui, |ui: &mut Ui| {
                ui.label("");
                for name in &corr.columns {
                    ui.strong(name);
                }
                ui.end_row();
                for (name, row) in corr.columns.iter().zip(&corr.values) {
                    ui.strong(name);
                    for &r in row {
                        let text = if r.is_nan() {
                            "–".to_string()
                        } else {
                            format!("{r:.2}")
                        };
                        ui.label(
                            RichText::new(text)
                                .monospace()
                                .color(Color32::BLACK)
                                .background_color(correlation_color(r)),
                        );
                    }
                    ui.end_row();
                }
            });
    });
}

// ---------------------------------------------------------------------------
// Modeling
// ---------------------------------------------------------------------------

pub fn modeling(ui: &mut Ui, state: &mut AppState) {
    if state.dataset.is_none() {
        no_dataset(ui);
        return;
    }

    ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        ui.heading("Random forest model");
        ui.add_space(4.0);

        let config = &mut state.trainer_config;
        egui::Grid::new("trainer_config").show(ui, |ui: &mut Ui| {
            ui.label("Trees");
            ui.add(DragValue::new(&mut config.n_estimators).range(1..=1000));
            ui.end_row();
            ui.label("Test fraction");
            ui.add(
                DragValue::new(&mut config.split_fraction)
                    .range(0.05..=0.5)
                    .speed(0.01),
            );
            ui.end_row();
            ui.label("Random seed");
            ui.add(DragValue::new(&mut config.random_seed));
            ui.end_row();
        });

        if ui.button("Train model").clicked() {
            let result = state.train();
            state.report(result);
        }
        ui.separator();

        let Some(eval) = &state.evaluation else {
            ui.label("No model trained yet.");
            return;
        };
        ui.label(
            RichText::new(format!("R² on test data: {:.4}", eval.accuracy_score))
                .strong()
                .size(18.0),
        );
        ui.label(format!("RMSE: {:.2}", eval.rmse));
        ui.label(format!(
            "{} training rows, {} test rows, {} features",
            eval.n_train(),
            eval.n_test(),
            eval.model.pipeline().n_features()
        ));
        ui.add_space(8.0);

        ui.strong("Top 10 feature importances");
        plot::feature_importances(ui, &eval.feature_importances, 10);
    });
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

pub fn prediction(ui: &mut Ui, state: &mut AppState) {
    let Some(eval) = state.evaluation.clone() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Train a model on the Modeling page first");
        });
        return;
    };
    let cities: Vec<String> = eval
        .model
        .pipeline()
        .categories(CITY_COLUMN)
        .unwrap_or_default()
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect();

    ui.heading("Predict AQI");
    ui.add_space(4.0);

    let form = &mut state.form;
    egui::Grid::new("prediction_form")
        .num_columns(2)
        .show(ui, |ui: &mut Ui| {
            ui.label("City");
            egui::ComboBox::from_id_salt("city")
                .selected_text(&form.city)
                .show_ui(ui, |ui: &mut Ui| {
                    for city in &cities {
                        ui.selectable_value(&mut form.city, city.clone(), city);
                    }
                });
            ui.end_row();

            ui.label("Date");
            ui.add(DatePickerButton::new(&mut form.date).id_salt("prediction_date"));
            ui.end_row();

            for (name, value) in &mut form.inputs {
                ui.label(name.as_str());
                ui.add(DragValue::new(value).range(0.0..=f64::MAX).speed(0.5));
                ui.end_row();
            }
        });

    ui.add_space(8.0);
    if ui.button("Predict").clicked() {
        let result = state.predict().map(|_| ());
        state.report(result);
    }

    if let Some((aqi, category)) = state.form.result {
        ui.add_space(8.0);
        ui.label(
            RichText::new(format!("Predicted AQI: {aqi:.1}"))
                .strong()
                .size(22.0),
        );
        ui.label(
            RichText::new(category.label())
                .strong()
                .size(18.0)
                .color(category_color(category)),
        );
    }
}
