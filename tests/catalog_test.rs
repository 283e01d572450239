use phasta_setup::catalog::{read_fields, write_fields, Catalog, FieldError, FieldMap};
use phasta_setup::io_stream::{ContainerReader, ContainerWriter};
use ndarray::{array, Array2};
use std::io::Cursor;

fn restart_bytes(fields: &FieldMap, time_step: i64) -> Vec<u8> {
    let mut writer = ContainerWriter::new(Vec::new());
    writer.write_file_header().unwrap();
    write_fields(&mut writer, &Catalog::restart(), fields, time_step).unwrap();
    writer.into_inner()
}

#[test]
fn test_solution_fields_recompose_into_one_block() {
    let mut fields = FieldMap::new();
    fields.insert("pressure".into(), array![[1.0, 2.0, 3.0]]);
    fields.insert("velocity".into(), Array2::from_shape_fn((3, 3), |(i, j)| (10 * i + j) as f64));

    let bytes = restart_bytes(&fields, 1300);
    let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();

    let descriptor = reader.descriptor("solution").unwrap();
    assert_eq!(descriptor.header_ints, vec![3, 5, 1300]);
    let block = reader.data_block::<f64>("solution").unwrap();
    assert_eq!(block.row(0).to_vec(), vec![1.0, 2.0, 3.0]);
    assert_eq!(block.row(2).to_vec(), vec![10.0, 11.0, 12.0]);
    // concentration was not supplied
    assert_eq!(block.row(4).to_vec(), vec![0.0; 3]);
    assert!(!reader.contains("displacement"));

    let decoded = read_fields(&mut reader, &Catalog::restart()).unwrap();
    assert_eq!(decoded["pressure"], fields["pressure"]);
    assert_eq!(decoded["velocity"], fields["velocity"]);
    assert_eq!(decoded["concentration"], Array2::<f64>::zeros((1, 3)));
    assert!(!decoded.contains_key("displacement"));
}

#[test]
fn test_missing_required_block_fails() {
    let mut writer = ContainerWriter::new(Vec::new());
    writer.write_file_header().unwrap();
    writer.write_data_block("displacement", &Array2::<f64>::zeros((3, 2)), &[0]).unwrap();
    let mut reader = ContainerReader::new(Cursor::new(writer.into_inner())).unwrap();

    let err = read_fields(&mut reader, &Catalog::restart()).unwrap_err();
    assert!(matches!(err, FieldError::MissingBlock { ref block, .. } if block == "solution"));
}

#[test]
fn test_header_only_optional_block_is_skipped() {
    let mut writer = ContainerWriter::new(Vec::new());
    writer.write_file_header().unwrap();
    writer.write_data_block("solution", &Array2::<f64>::ones((5, 2)), &[0]).unwrap();
    writer.write_header("time derivative of solution", 0, &[2, 5, 0]).unwrap();
    let mut reader = ContainerReader::new(Cursor::new(writer.into_inner())).unwrap();

    let fields = read_fields(&mut reader, &Catalog::restart()).unwrap();
    assert_eq!(fields.len(), 3);
    assert!(!fields.contains_key("pressure derivative"));
}

#[test]
fn test_ybar_field_reads_first_component() {
    let mut writer = ContainerWriter::new(Vec::new());
    writer.write_file_header().unwrap();
    writer.write_data_block("ybar", &array![[4.0, 5.0, 6.0, 7.0]], &[1, 1300]).unwrap();
    let mut reader = ContainerReader::new(Cursor::new(writer.into_inner())).unwrap();

    let fields = read_fields(&mut reader, &Catalog::ybar()).unwrap();
    assert_eq!(fields["ybar"], array![[4.0, 5.0, 6.0, 7.0]]);
}

#[test]
fn test_write_rejects_inconsistent_fields() {
    let restart = Catalog::restart();
    let mut writer = ContainerWriter::new(Vec::new());

    let mut fields = FieldMap::new();
    fields.insert("pressure".into(), Array2::zeros((1, 3)));
    fields.insert("velocity".into(), Array2::zeros((3, 4)));
    let err = write_fields(&mut writer, &restart, &fields, 0).unwrap_err();
    assert!(matches!(err, FieldError::ElementMismatch { first: 3, other: 4, .. }));

    let mut fields = FieldMap::new();
    fields.insert("velocity".into(), Array2::zeros((2, 4)));
    let err = write_fields(&mut writer, &restart, &fields, 0).unwrap_err();
    assert!(matches!(err, FieldError::ComponentMismatch { expected: 3, found: 2, .. }));

    let mut fields = FieldMap::new();
    fields.insert("temperature".into(), Array2::zeros((1, 4)));
    let err = write_fields(&mut writer, &restart, &fields, 0).unwrap_err();
    assert!(matches!(err, FieldError::UnknownField(ref name) if name == "temperature"));
}
