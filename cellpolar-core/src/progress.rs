use cellpolar_concepts::TimeError;
use kdam::BarExt;

/// Creates a bar which tracks the number of collected snapshots.
pub fn initialize_bar(total: usize) -> Result<kdam::Bar, TimeError> {
    let bar_format = "\
    {desc}{percentage:3.0}%|{animation}| \
    {count}/{total} \
    [{elapsed}, \
    {rate:.2}{unit}/s{postfix}]";
    Ok(kdam::BarBuilder::default()
        .total(total)
        .bar_format(bar_format)
        .dynamic_ncols(true)
        .build()?)
}

/// Advances the bar by one snapshot and displays the current number of cells.
pub fn update_bar(bar: &mut kdam::Bar, n_cells: usize) -> Result<(), TimeError> {
    bar.set_postfix(format!("cells={n_cells}"));
    let _ = bar.update(1)?;
    Ok(())
}
