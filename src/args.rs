use clap::Parser;

/// Adds the part number (PART_NO) of each respondent to a table of survey responses, by looking up
/// the respondent phone numbers in the master data file of their constituency.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the settings of the run. The options given on the command
    /// line override the values of this file. Relative paths in the file are read from the directory of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The table of responses, in CSV or Excel (.xlsx) format.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path) Where to write the responses with the part number column, in CSV format.
    /// The file is only created once the whole run has succeeded.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory, default master_data) The directory containing the master data files
    /// (ac001.xlsx, ac002.csv, ...). Its subdirectories are also searched.
    #[clap(short, long, value_parser)]
    pub master_dir: Option<String>,

    /// (file path, default assemblyConstituencies.json) The JSON document mapping the constituency names to their codes.
    #[clap(long, value_parser)]
    pub constituencies: Option<String>,

    /// (optional) Only use the constituencies of this region of the reference document.
    #[clap(long, value_parser)]
    pub region: Option<String>,

    /// (default 'Selected AC') The column of the input holding the constituency name.
    #[clap(long, value_parser)]
    pub constituency_column: Option<String>,

    /// (default 'Respondent Contact Number') The column of the input holding the phone number.
    #[clap(long, value_parser)]
    pub phone_column: Option<String>,

    /// (default PART_NO) The name of the column added to the output. An existing column with
    /// this name is overwritten.
    #[clap(long, value_parser)]
    pub output_column: Option<String>,

    /// When the input is an Excel file, the name of the worksheet to use (default: the first one).
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the run will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub summary: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, partno will check that the summary of the run
    /// matches the reference and fail otherwise.
    #[clap(long, value_parser)]
    pub expected_summary: Option<String>,

    /// (shell command) Run when a master data file is missing locally. '{file}' is replaced by the name of
    /// the file and '{dir}' by the master data directory.
    #[clap(long, value_parser)]
    pub fetch_command: Option<String>,

    /// If passed as an argument, the master data files obtained with the fetch command are kept after use.
    #[clap(long, takes_value = false)]
    pub keep_fetched: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
