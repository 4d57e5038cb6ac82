use csv::{ReaderBuilder, Trim};
use ndarray::Array2;
use std::fs::File;
use std::str::FromStr;

/// Reads a labelled point sample; the last column holds the generating class.
pub fn read_labelled_data(file_path: &str) -> (Array2<f64>, Vec<usize>) {
    let file = File::open(file_path).unwrap();
    let mut reader = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(file);

    let n_columns = reader.headers().unwrap().len() - 1;

    let mut flat_data: Vec<f64> = Vec::new();
    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record.unwrap();
        flat_data.extend(record.iter().take(n_columns).map(|b| f64::from_str(b).unwrap()));
        labels.push(usize::from_str(&record[n_columns]).unwrap());
    }

    let data = Array2::from_shape_vec((labels.len(), n_columns), flat_data)
        .expect("Could not deserialize test data");
    (data, labels)
}

pub fn two_gaussians() -> (Array2<f64>, Vec<usize>) {
    read_labelled_data("data/two_gaussians.csv")
}

pub fn close_l1(a: f64, b: f64, threshold: f64) -> bool {
    (a - b).abs() < threshold
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
