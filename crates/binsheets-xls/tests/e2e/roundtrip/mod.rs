mod cells;
mod drawings;
mod formulas;
mod names;
mod sheets;
mod styles;
