/*!

This is the long-form manual for `part_lookup` and `partno`.

## What it does

A survey export contains one row per response, with the name of the
constituency (AC) of the respondent and the respondent's phone number.
For each constituency there is a master data file that lists phone numbers
with the polling part number (`PART_NO`) of the person. `partno` adds a
`PART_NO` column to the survey export by matching the phone numbers within
each constituency.

## Phone numbers

Phone numbers are compared on a 10-digit key:
- `+919876543210`, `919876543210`, `09876543210` and `9876543210` are the same key
- numbers stored as numbers in a spreadsheet (`7908938513.0`) are read exactly
- anything with fewer than 10 digits never matches

## Constituency reference

The constituency names are mapped to codes with a JSON document. Both of
these shapes are accepted:

```json
{"states": {"West Bengal": {"assemblyConstituencies": [
    {"acName": "Kharagpur", "acCode": "WB223"}
]}}}
```

```json
{"West Bengal": [{"acName": "Kharagpur", "acCode": "WB223"}]}
```

The code `WB223` gives the numeric id `223`, used to find the master data file.

## Master data files

For the numeric id `223`, the following files are looked for in the master
data directory, and then in each of its subdirectories:
`ac223.xlsx`, `ac223.csv`, `AC223.xlsx`, `AC223.csv`, `WB223.xlsx`, `WB223.csv`.
For a number below 100, both the padded (`ac007.csv`) and the unpadded
(`ac7.csv`) names are tried.

The phone column is the first column whose name contains `phone`, `mobile`,
`contact` or `tel` (in this order of preference). The part number column is
the first one whose name contains `partno`, `part_no`, `partnumber`, `partnum`
or `part`. The comparison ignores case, spaces, dashes and underscores.

If a phone number appears several times in a master file, the first row wins.

## Fetching master data on demand

With `--fetch-command`, a command is run when a master data file is missing.
The command may use `{file}` (the candidate file name) and `{dir}` (the master
data directory). For example:

```bash
partno -i responses.csv -o out.csv \
    --fetch-command 'rclone copy remote:master_data/{file} {dir}'
```

The files obtained this way are deleted once their constituency is processed,
unless `--keep-fetched` is passed.

## Output

The output is the input table with one more column (`PART_NO` by default),
empty for the rows that did not match. It is always written as CSV, with a
UTF-8 byte order mark so that spreadsheet tools read it correctly. The file
only appears once the whole run has succeeded.

A summary (total rows, matched, not matched, match rate) is always printed.
With `--summary out.json` it is also written as JSON, with the details of
each constituency.

*/
