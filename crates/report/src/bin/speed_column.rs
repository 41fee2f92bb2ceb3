//! Print the execution time column of the benchmark report, one value per line.

use report_columns::{print_column, Table};

fn main() {
    print_column(Table::Speed);
}
